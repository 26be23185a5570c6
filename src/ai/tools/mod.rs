pub mod booking;
pub use booking::{BookMeetingTool, BookingConfirmation, BookingError, BookingRequest};

pub mod calendar;
pub use calendar::CheckCalendarTool;

use crate::ai::time::TimeNormalizer;
use crate::google::SharedGateway;
use crate::openai::BoxedToolCall;

/// Every tool the assistant can call, sharing one calendar gateway.
pub fn calendar_tools(gateway: SharedGateway, normalizer: TimeNormalizer) -> Vec<BoxedToolCall> {
    vec![
        Box::new(BookMeetingTool::new(gateway.clone(), normalizer)),
        Box::new(CheckCalendarTool::new(gateway)),
    ]
}
