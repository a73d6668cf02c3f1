//! Shared test harness modules for the geoflag CLI.

use super::*;

mod helpers;
mod unit;
