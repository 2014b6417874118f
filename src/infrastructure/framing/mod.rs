mod event_codec;
mod sse_line_buffer;

pub use event_codec::{EventDecoder, MalformedEvent, decode_all, encode_event, event_payload};
pub use sse_line_buffer::{SseLineBuffer, block_data};
