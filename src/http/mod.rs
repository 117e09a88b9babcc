//! Translation layer between raw HTTP and the gateway event shape.
//!
//! - [`event`]: inbound request → [`GatewayEvent`]
//! - [`envelope`]: gateway event → forward request for the handler
//! - [`response`]: handler response → [`NormalizedResponse`]
//! - [`hydrate`]: normalized response → outbound HTTP response

pub mod envelope;
pub mod event;
pub mod hydrate;
pub mod response;

pub use envelope::{build_forward_request, CoreRuntimeRequest, HandlerInfo};
pub use event::{format_event, to_event, GatewayEvent, RequestContext, TriggerType};
pub use hydrate::{apply_cors, merge_headers, write, CORS_ALLOW_HEADERS, CORS_ALLOW_ORIGIN};
pub use response::{is_json, parse_response, NormalizedResponse};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::Engine;
use std::collections::HashMap;

/// Header name → every value, in arrival order.
pub type MultiValueHeaders = HashMap<String, Vec<String>>;

/// Standard padded alphabet that tolerates non-zero trailing bits, which is
/// what function runtimes on the platform accept.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Decode standard base64, ignoring embedded line breaks.
pub(crate) fn decode_base64(input: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    if input.iter().any(|b| *b == b'\r' || *b == b'\n') {
        let stripped: Vec<u8> = input
            .iter()
            .copied()
            .filter(|b| *b != b'\r' && *b != b'\n')
            .collect();
        return BASE64.decode(stripped);
    }
    BASE64.decode(input)
}
