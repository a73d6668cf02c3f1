//! Flag model for map data-quality checks.
//!
//! A [`Flag`] records one problem found by a [`rule::Rule`] over one or more
//! entities. Flags carry instructions and optional [`FixSuggestion`]s, and
//! move between processes through the GeoJSON forms in [`interchange`].
//!
//! ```
//! use geo::Coord;
//! use geoflag_core::interchange::{FlagContext, from_feature_collection, to_feature_collection};
//! use geoflag_core::{CompleteEntity, Flag, FixSuggestion};
//!
//! let node = CompleteEntity::node(1_000_000, Coord { x: 1.0, y: 2.0 });
//! let mut flag = Flag::new("F1").with_challenge("Barriers");
//! flag.add_object(&node);
//! flag.add_instruction("Tag the barrier");
//! flag.add_fix_suggestion(FixSuggestion::from_views(
//!     node.clone(),
//!     node.clone().with_tag("barrier", "gate"),
//! ));
//!
//! let value = to_feature_collection(&flag, &FlagContext::default());
//! let read = from_feature_collection(&value).expect("round trip");
//! assert_eq!(read.objects(), flag.objects());
//! assert_eq!(read.fix_suggestions().len(), 1);
//! ```

#![forbid(unsafe_code)]

pub mod entity;
pub mod fix;
pub mod flag;
pub mod flagged;
pub mod geojson;
pub mod interchange;
pub mod rule;
pub mod wkt;

pub use entity::{
    CompleteEntity, Entity, EntityShape, ISO_COUNTRY_TAG, ItemType, RelationMember, Tags,
    UnknownItemType,
};
pub use fix::{ChangeDescriptor, ChangeOperation, DescriptorName, FixSuggestion};
pub use flag::{FLAG_COUNTRY_MISSING, Flag, UniqueFlagContainer};
pub use flagged::{FlaggedObject, FlaggedPoint, FlaggedPolyline, FlaggedRelation};
pub use interchange::{DeserializeError, FlagContext};
pub use rule::{Rule, RuleConfig, RuleError, RuleRegistry};
