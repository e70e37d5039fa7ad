//! DriveShaft
//!
//! Intercepts same-origin link clicks and form submissions, fetches the
//! destination asynchronously and reconciles the fetched HTML into the live
//! document instead of performing a full page load.
//!
//! The pieces, leaf first:
//! - [`attributes`]: attribute synchronization between elements
//! - [`head`]: signature-based `<head>` merging
//! - [`body`]: `<body>` replacement with permanent elements and script
//!   re-execution
//! - [`Replacer`]: sequences head and body reconciliation
//! - [`DriveShaft`]: the navigation dispatcher

pub mod attributes;
pub mod body;
pub mod config;
mod driveshaft;
pub mod head;
pub mod host;
pub mod navigation;
pub mod replacer;
pub mod request;

pub use config::{Config, ConfigError};
pub use driveshaft::DriveShaft;
pub use host::BrowserHost;
pub use navigation::{
    should_intercept, FocusReset, Interception, NavigateEvent, NavigationOutcome, NavigationSource,
    NavigationState, NavigationType, ScrollBehavior,
};
pub use replacer::{RenderReport, ReplaceError, ReplaceStrategy, Replacer};
pub use request::{build_request, NavigationRequest};

pub use driveshaft_dom as dom;
pub use driveshaft_html as html;
pub use driveshaft_net as net;

/// DriveShaft version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
