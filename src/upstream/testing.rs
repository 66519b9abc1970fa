//! Scripted provider for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::cache::MinimapSpec;
use crate::error::Result;
use crate::upstream::{GeocodeReply, GeolocStatus, MapsProvider, StaticMapReply, PNG_SIGNATURE};

/// Replays scripted statuses, then repeats the fallback.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<GeolocStatus>>,
    fallback: GeolocStatus,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<GeolocStatus>, fallback: GeolocStatus) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    fn next_status(&self) -> GeolocStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MapsProvider for ScriptedProvider {
    async fn reverse_geocode(&self, _latitude: &str, _longitude: &str) -> Result<GeocodeReply> {
        let status = self.next_status();
        let address = (status == GeolocStatus::Ok).then(|| "Main Street 1".to_string());
        Ok(GeocodeReply { status, address })
    }

    async fn static_map(
        &self,
        _latitude: &str,
        _longitude: &str,
        _spec: MinimapSpec,
    ) -> Result<StaticMapReply> {
        let status = self.next_status();
        let image = (status == GeolocStatus::Ok).then(|| PNG_SIGNATURE.to_vec());
        Ok(StaticMapReply { status, image })
    }
}
