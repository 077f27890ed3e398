use derive_builder::Builder;
use fehler::{throw, throws};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{from_str, Value};
use tracing::{debug, error, trace};
use url::Url;

use crate::credential::Credential;
use crate::error::OandaError;
use crate::parser::json_lines;
use crate::stream::TransactionStream;

use super::models::{Descriptor, Request, TransactionsStream};

pub const DEFAULT_DATETIME_FORMAT: &str = "RFC3339";

/// Executes transaction requests against the v20 REST and streaming hosts and
/// attaches the decoded responses. One attempt per call, no retries.
#[derive(Clone, Builder)]
pub struct OandaRest {
    #[builder(setter(into))]
    url: String,
    #[builder(setter(into))]
    stream_url: String,
    #[builder(default)]
    client: Client,
    #[builder(default, setter(strip_option))]
    credential: Option<Credential>,
    #[builder(default = "DEFAULT_DATETIME_FORMAT.to_string()", setter(into))]
    datetime_format: String,
}

impl OandaRest {
    pub fn new(url: &str, stream_url: &str) -> Self {
        OandaRest {
            url: url.to_string(),
            stream_url: stream_url.to_string(),
            client: Client::new(),
            credential: None,
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
        }
    }

    pub fn with_token(url: &str, stream_url: &str, token: &str) -> Self {
        OandaRest {
            credential: Some(Credential::new(token)),
            ..Self::new(url, stream_url)
        }
    }

    pub fn builder() -> OandaRestBuilder {
        OandaRestBuilder::default()
    }

    #[throws(OandaError)]
    pub async fn request<R>(&self, req: &mut R)
        where
            R: Request<Response=Value>,
    {
        let resp = self.send(&self.url, req.descriptor()).await?;
        let payload = self.handle_response(resp).await?;
        req.set_response(payload);
    }

    /// Opens the transaction stream and attaches it to the request. Events are
    /// decoded lazily while the consumer polls.
    #[throws(OandaError)]
    pub async fn stream(&self, req: &mut TransactionsStream) {
        let resp = self.send(&self.stream_url, req.descriptor()).await?;
        let status = resp.status();
        if !status.is_success() {
            let payload = resp.text().await?;
            throw!(api_error(status.as_u16(), payload))
        }
        debug!("Transactions stream opened for '{}'", req.path());
        req.set_response(TransactionStream::new(json_lines(resp.bytes_stream())));
    }

    #[throws(OandaError)]
    pub fn url_for(&self, base: &str, descriptor: &Descriptor) -> Url {
        let url = format!("{}/{}", base.trim_end_matches('/'), descriptor.path());
        let mut url = Url::parse(&url)?;
        if let Some(params) = descriptor.params().filter(|params| !params.is_empty()) {
            url.set_query(Some(&params.to_query()?));
        }
        url
    }

    #[throws(OandaError)]
    async fn send(&self, base: &str, descriptor: &Descriptor) -> Response {
        let url = self.url_for(base, descriptor)?;
        trace!("Request url: {url:?}");
        let cred = self.get_credential()?;

        self.client.request(descriptor.method().clone(), url)
            .header("Authorization", cred.authorization())
            .header("Accept-Datetime-Format", &self.datetime_format)
            .header("content-type", "application/json")
            .header("user-agent", "oanda-eac")
            .send()
            .await?
    }

    #[throws(OandaError)]
    fn get_credential(&self) -> &Credential {
        match self.credential.as_ref() {
            None => throw!(OandaError::NoApiKeySet),
            Some(c) => c,
        }
    }

    #[throws(OandaError)]
    async fn handle_response(&self, resp: Response) -> Value {
        let status = resp.status();
        let payload = resp.text().await?;
        trace!("Response: {payload}");

        if !status.is_success() {
            throw!(api_error(status.as_u16(), payload))
        }
        match from_str::<Value>(&payload) {
            Ok(v) => v,
            Err(e) => {
                error!("Cannot deserialize response from {}: {}", payload, e);
                throw!(OandaError::CannotDeserializeResponse(payload))
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OandaErrorEnvelope {
    error_message: String,
}

fn api_error(status: u16, payload: String) -> OandaError {
    let message = from_str::<OandaErrorEnvelope>(&payload)
        .map(|envelope| envelope.error_message)
        .unwrap_or(payload);
    error!("Request failed with status {status}: {message}");
    OandaError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use crate::rest::{Params, TransactionDetails, TransactionIdRange, TransactionList};

    use super::*;

    const URL: &str = "https://api-fxpractice.oanda.com/";
    const STREAM_URL: &str = "https://stream-fxpractice.oanda.com";

    #[test]
    fn test_url_for_list() {
        let client = OandaRest::new(URL, STREAM_URL);
        let request = TransactionList::new("101-004-1", None).unwrap();
        let url = client.url_for(URL, request.descriptor()).unwrap();
        assert_eq!(url.as_str(), "https://api-fxpractice.oanda.com/v3/accounts/101-004-1/transactions");
    }

    #[test]
    fn test_url_for_id_range_carries_query() {
        let client = OandaRest::new(URL, STREAM_URL);
        let request = TransactionIdRange::new("101-004-1", Params::from([("from", "1"), ("to", "10")])).unwrap();
        let url = client.url_for(URL, request.descriptor()).unwrap();
        assert_eq!(url.path(), "/v3/accounts/101-004-1/transactions/idrange");
        assert_eq!(url.query(), Some("from=1&to=10"));
    }

    #[test]
    fn test_url_for_keeps_descriptor_path() {
        let client = OandaRest::new(URL, STREAM_URL);
        for (account_id, transaction_id) in [("101-004-1", "6410"), ("A.1", "6.410"), ("A1", "...")] {
            let request = TransactionDetails::new(account_id, transaction_id).unwrap();
            let url = client.url_for(URL, request.descriptor()).unwrap();
            assert_eq!(url.path(), format!("/{}", request.path()));
            assert_eq!(url.query(), None);
            assert_eq!(url.fragment(), None);
        }
        assert!(TransactionDetails::new("A1", "..").is_err());
        assert!(TransactionList::new("A1#f", None).is_err());
    }

    #[test]
    fn test_api_error_prefers_error_message() {
        let error = api_error(404, r#"{"errorMessage":"The transaction ID specified does not exist"}"#.to_string());
        assert!(matches!(error, OandaError::Api { status: 404, message } if message.starts_with("The transaction ID")));

        let error = api_error(502, "Bad Gateway".to_string());
        assert!(matches!(error, OandaError::Api { status: 502, message } if message == "Bad Gateway"));
    }

    #[tokio::test]
    async fn test_request_without_token_fails() {
        let client = OandaRest::new(URL, STREAM_URL);
        let mut request = TransactionDetails::new("101-004-1", "7").unwrap();
        let error = client.request(&mut request).await.unwrap_err();
        assert!(matches!(error, OandaError::NoApiKeySet));
        assert!(request.response().is_none());
    }

    #[test]
    fn test_builder_defaults() {
        let client = OandaRest::builder()
            .url(URL)
            .stream_url(STREAM_URL)
            .credential(Credential::new("token"))
            .build()
            .unwrap();
        assert_eq!(client.datetime_format, DEFAULT_DATETIME_FORMAT);
        assert!(client.get_credential().is_ok());
    }
}
