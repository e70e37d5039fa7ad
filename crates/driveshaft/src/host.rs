//! Browser host seam
//!
//! What DriveShaft needs from the environment it runs in beyond the DOM and
//! HTTP: history, native activation for fallbacks, and the render hooks
//! around DOM mutation.

use std::future::Future;

use driveshaft_dom::NodeId;
use url::Url;

pub trait BrowserHost {
    /// Push a history entry for `url`
    fn push_history(&self, url: &Url);

    /// Natively activate an anchor
    fn click(&self, anchor: NodeId);

    /// Natively submit `form`, optionally through `submitter`
    fn submit(&self, form: NodeId, submitter: Option<NodeId>);

    /// Awaited right before the DOM is mutated, e.g. to start a view
    /// transition
    fn before_render(&self) -> impl Future<Output = ()> {
        async {}
    }

    /// Awaited after the DOM was mutated. Defaults to one cooperative
    /// yield, standing in for a frame.
    fn after_render(&self) -> impl Future<Output = ()> {
        smol::future::yield_now()
    }
}
