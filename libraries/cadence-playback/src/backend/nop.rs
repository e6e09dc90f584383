//! Backend that accepts every locator and decodes nothing

use super::{Backend, DecoderEventSink, DecoderHandle, DecoderStatus};
use crate::error::Result;
use cadence_core::{Locator, SharedItem};
use std::time::Duration;

/// No-op backend for headless runs and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct NopBackend;

impl NopBackend {
    pub const NAME: &'static str = "nop";
}

impl Backend for NopBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_handle(&self, _locator: &Locator) -> bool {
        true
    }

    fn construct(
        &self,
        item: &SharedItem,
        events: DecoderEventSink,
    ) -> Result<Box<dyn DecoderHandle>> {
        tracing::trace!(item = %item.id(), "constructing no-op handle");
        Ok(Box::new(NopHandle::new(events)))
    }
}

/// Handle that only tracks the state it is told about
///
/// It never reports end of media.
#[derive(Debug)]
pub struct NopHandle {
    events: DecoderEventSink,
    status: DecoderStatus,
    position: Duration,
    volume: f32,
}

impl NopHandle {
    pub fn new(events: DecoderEventSink) -> Self {
        Self {
            events,
            status: DecoderStatus::Ready,
            position: Duration::ZERO,
            volume: 1.0,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn set_status(&mut self, status: DecoderStatus) {
        if self.status != status {
            self.status = status;
            self.events.status_changed(status);
        }
    }
}

impl DecoderHandle for NopHandle {
    fn play(&mut self) -> Result<()> {
        self.set_status(DecoderStatus::Playing);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.set_status(DecoderStatus::Paused);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.position = Duration::ZERO;
        self.set_status(DecoderStatus::Stopped);
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.position = position;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn status(&self) -> DecoderStatus {
        self.status
    }

    fn dispose(&mut self) {
        self.set_status(DecoderStatus::Disposed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DecoderEventKind;
    use cadence_core::{ItemBuilder, ItemId};
    use crossbeam_channel::unbounded;

    #[test]
    fn nop_handle_tracks_state() {
        let item = ItemBuilder::new(Locator::parse("https://radio.example/stream").unwrap())
            .id(ItemId::new("radio"))
            .build_shared();
        let (tx, rx) = unbounded();
        let backend = NopBackend;
        assert!(backend.can_handle(item.locator()));

        let mut handle = backend
            .construct(&item, DecoderEventSink::new(item.id().clone(), tx))
            .unwrap();
        assert_eq!(handle.status(), DecoderStatus::Ready);

        handle.play().unwrap();
        handle.seek(Duration::from_secs(42)).unwrap();
        assert_eq!(handle.position(), Duration::from_secs(42));
        handle.stop().unwrap();
        assert_eq!(handle.position(), Duration::ZERO);

        let kinds: Vec<_> = rx.try_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DecoderEventKind::StatusChanged(DecoderStatus::Playing),
                DecoderEventKind::StatusChanged(DecoderStatus::Stopped),
            ]
        );
    }
}
