//! Outbound side: invoking renderer actions.
//!
//! The transport (SOAP, HTTP, ...) lives behind [`ActionInvoker`]; this module
//! only knows action names and argument layouts.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::errors::Result;
use crate::time_utils::{format_hhmmss, parse_upnp_time};

pub const AVTRANSPORT_SERVICE: &str = "AVTransport";

pub type ActionArgs = BTreeMap<String, String>;
pub type ActionOutputs = HashMap<String, String>;

/// Sends one action to the renderer and returns its output arguments.
///
/// Calls block until the renderer answered or the transport gave up.
pub trait ActionInvoker: Send + Sync {
    fn invoke(&self, service_id: &str, action_id: &str, args: &ActionArgs) -> Result<ActionOutputs>;
}

impl<F> ActionInvoker for F
where
    F: Fn(&str, &str, &ActionArgs) -> Result<ActionOutputs> + Send + Sync,
{
    fn invoke(&self, service_id: &str, action_id: &str, args: &ActionArgs) -> Result<ActionOutputs> {
        self(service_id, action_id, args)
    }
}

/// Raw `GetPositionInfo` outputs. A field is `None` when the renderer left it out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionInfo {
    pub track_duration: Option<String>,
    pub rel_time: Option<String>,
}

impl PositionInfo {
    pub fn duration_secs(&self) -> Option<u64> {
        self.track_duration.as_deref().and_then(parse_upnp_time)
    }

    pub fn position_secs(&self) -> Option<u64> {
        self.rel_time.as_deref().and_then(parse_upnp_time)
    }
}

/// AVTransport actions used by the playback controller.
#[derive(Clone)]
pub struct AvTransportClient {
    invoker: Arc<dyn ActionInvoker>,
    instance_id: u32,
}

impl AvTransportClient {
    pub fn new(invoker: Arc<dyn ActionInvoker>, instance_id: u32) -> Self {
        Self {
            invoker,
            instance_id,
        }
    }

    fn args(&self, extra: &[(&str, &str)]) -> ActionArgs {
        let mut args = ActionArgs::new();
        args.insert("InstanceID".to_string(), self.instance_id.to_string());
        for (key, value) in extra {
            args.insert((*key).to_string(), (*value).to_string());
        }
        args
    }

    fn call(&self, action: &str, extra: &[(&str, &str)]) -> Result<ActionOutputs> {
        self.invoker
            .invoke(AVTRANSPORT_SERVICE, action, &self.args(extra))
    }

    pub fn set_av_transport_uri(&self, uri: &str, metadata: &str) -> Result<()> {
        self.call(
            "SetAVTransportURI",
            &[("CurrentURI", uri), ("CurrentURIMetaData", metadata)],
        )
        .map(|_| ())
    }

    pub fn set_next_av_transport_uri(&self, uri: &str, metadata: &str) -> Result<()> {
        self.call(
            "SetNextAVTransportURI",
            &[("NextURI", uri), ("NextURIMetaData", metadata)],
        )
        .map(|_| ())
    }

    pub fn play(&self) -> Result<()> {
        self.call("Play", &[("Speed", "1")]).map(|_| ())
    }

    pub fn stop(&self) -> Result<()> {
        self.call("Stop", &[]).map(|_| ())
    }

    pub fn pause(&self) -> Result<()> {
        self.call("Pause", &[]).map(|_| ())
    }

    pub fn seek(&self, seconds: u64) -> Result<()> {
        let target = format_hhmmss(seconds);
        self.call("Seek", &[("Unit", "REL_TIME"), ("Target", &target)])
            .map(|_| ())
    }

    pub fn get_position_info(&self) -> Result<PositionInfo> {
        let mut outputs = self.call("GetPositionInfo", &[])?;
        Ok(PositionInfo {
            track_duration: outputs.remove("TrackDuration"),
            rel_time: outputs.remove("RelTime"),
        })
    }
}
