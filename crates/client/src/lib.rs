//! Peers of the gateway: the interface client SDK used by chat front-ends,
//! and the grid tick producer.

pub mod interface;
pub mod ticker;

use {nexus_protocol::TOKEN_PARAM, url::Url};

pub use {
    interface::{ClientError, InterfaceClient},
    ticker::{TickSource, run_ticker},
};

/// Append the shared secret to a gateway URL as `?token=` (or `&token=`).
pub fn with_token(base: &str, token: Option<&str>) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        url.query_pairs_mut().append_pair(TOKEN_PARAM, token);
    }
    Ok(url)
}
