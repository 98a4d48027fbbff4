use crate::domain::{
    chart::ChartSession,
    events::ChartEvent,
    logging::LogComponent,
    market_data::{FrameDecoder, LiveBar, services::DataValidationService},
};
use crate::log_error;

/// Decodes live frames and merges them into the active session.
///
/// A frame that fails to decode or carries an invalid bar is logged, counted
/// and dropped; the stream keeps going.
pub struct StreamMerger<D> {
    decoder: D,
    validator: DataValidationService,
}

impl<D: FrameDecoder> StreamMerger<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder, validator: DataValidationService::new() }
    }

    pub fn merge_frame(&self, session: &mut ChartSession, frame: &str) -> Option<ChartEvent> {
        match self.decoder.decode(frame) {
            Ok(live) => self.merge_bar(session, live),
            Err(err) => {
                session.record_decode_error();
                log_error!(LogComponent::Application("StreamMerger"), "{}: dropped frame: {}", session.key(), err);
                None
            }
        }
    }

    pub fn merge_bar(&self, session: &mut ChartSession, live: LiveBar) -> Option<ChartEvent> {
        if let Err(err) = self.validator.validate_bar(&live.bar) {
            session.record_decode_error();
            log_error!(LogComponent::Application("StreamMerger"), "{}: dropped bar: {}", session.key(), err);
            return None;
        }
        session.apply_live_bar(live)
    }
}
