use http::Method;
use tracing::debug;

use crate::error::{OandaError, Result};

use super::params::Params;

pub const ACCOUNT_ID: &str = "accountID";
pub const TRANSACTION_ID: &str = "transactionID";

/// How an endpoint treats caller supplied query parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamCapture {
    /// Parameters are dropped.
    None,
    Optional,
    Required,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Piece {
    Literal(&'static str),
    Placeholder(&'static str),
}

/// Path template with `{name}` placeholders, e.g. `v3/accounts/{accountID}/transactions`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Template(&'static str);

impl Template {
    pub const fn new(template: &'static str) -> Self {
        Self(template)
    }

    pub fn placeholders(&self) -> Vec<&'static str> {
        self.pieces()
            .into_iter()
            .filter_map(|piece| match piece {
                Piece::Placeholder(name) => Some(name),
                Piece::Literal(_) => None,
            })
            .collect()
    }

    pub fn contains(&self, placeholder: &str) -> bool {
        self.placeholders().iter().any(|name| *name == placeholder)
    }

    /// Substitutes every placeholder of the template. Values for names the
    /// template does not use are ignored.
    pub fn resolve(&self, values: &[(&str, &str)]) -> Result<String> {
        let mut path = String::with_capacity(self.0.len());
        for piece in self.pieces() {
            match piece {
                Piece::Literal(literal) => path.push_str(literal),
                Piece::Placeholder(name) => {
                    let value = values.iter()
                        .find(|(key, _)| *key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| OandaError::invalid_argument(format!("{name} is required for '{}'", self.0)))?;
                    path.push_str(value);
                }
            }
        }
        Ok(path)
    }

    /// Inverse of [`Template::resolve`]: recovers placeholder values from a resolved path.
    pub fn extract(&self, path: &str) -> Option<Vec<(&'static str, String)>> {
        let pieces = self.pieces();
        let mut rest = path;
        let mut values = Vec::new();
        for (index, piece) in pieces.iter().enumerate() {
            match piece {
                Piece::Literal(literal) => rest = rest.strip_prefix(*literal)?,
                Piece::Placeholder(name) => {
                    let end = match pieces.get(index + 1) {
                        Some(Piece::Literal(next)) => rest.find(*next)?,
                        _ => rest.len(),
                    };
                    let (value, tail) = rest.split_at(end);
                    if value.is_empty() || value.contains('/') {
                        return None;
                    }
                    values.push((*name, value.to_string()));
                    rest = tail;
                }
            }
        }
        rest.is_empty().then_some(values)
    }

    fn pieces(&self) -> Vec<Piece> {
        let mut pieces = Vec::new();
        let mut rest = self.0;
        while let Some(start) = rest.find('{') {
            let Some(length) = rest[start..].find('}') else { break };
            if start > 0 {
                pieces.push(Piece::Literal(&rest[..start]));
            }
            pieces.push(Piece::Placeholder(&rest[start + 1..start + length]));
            rest = &rest[start + length + 1..];
        }
        if !rest.is_empty() {
            pieces.push(Piece::Literal(rest));
        }
        pieces
    }
}

#[derive(Debug)]
pub struct EndpointDefinition {
    pub endpoint: Endpoint,
    pub template: Template,
    pub method: Method,
    pub params: ParamCapture,
    pub stream: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    TransactionList,
    TransactionDetails,
    TransactionIdRange,
    TransactionSinceId,
    TransactionsStream,
}

static CATALOG: [EndpointDefinition; 5] = [
    EndpointDefinition {
        endpoint: Endpoint::TransactionList,
        template: Template::new("v3/accounts/{accountID}/transactions"),
        method: Method::GET,
        params: ParamCapture::Optional,
        stream: false,
    },
    EndpointDefinition {
        endpoint: Endpoint::TransactionDetails,
        template: Template::new("v3/accounts/{accountID}/transactions/{transactionID}"),
        method: Method::GET,
        params: ParamCapture::None,
        stream: false,
    },
    EndpointDefinition {
        endpoint: Endpoint::TransactionIdRange,
        template: Template::new("v3/accounts/{accountID}/transactions/idrange"),
        method: Method::GET,
        params: ParamCapture::Required,
        stream: false,
    },
    EndpointDefinition {
        endpoint: Endpoint::TransactionSinceId,
        template: Template::new("v3/accounts/{accountID}/transactions/sinceid"),
        method: Method::GET,
        params: ParamCapture::Required,
        stream: false,
    },
    EndpointDefinition {
        endpoint: Endpoint::TransactionsStream,
        template: Template::new("v3/accounts/{accountID}/transactions/stream"),
        method: Method::GET,
        params: ParamCapture::Optional,
        stream: true,
    },
];

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::TransactionList,
        Endpoint::TransactionDetails,
        Endpoint::TransactionIdRange,
        Endpoint::TransactionSinceId,
        Endpoint::TransactionsStream,
    ];

    pub fn definition(self) -> &'static EndpointDefinition {
        &CATALOG[self as usize]
    }

    /// Builds the descriptor of one request against this endpoint.
    ///
    /// The transaction id is only used when the template has a `{transactionID}`
    /// segment, and params are dropped for endpoints that take none.
    pub fn build(self, account_id: &str, transaction_id: Option<&str>, params: Option<Params>) -> Result<Descriptor> {
        let definition = self.definition();
        check_identifier(ACCOUNT_ID, account_id)?;

        let mut values = vec![(ACCOUNT_ID, account_id)];
        if let Some(transaction_id) = transaction_id {
            if definition.template.contains(TRANSACTION_ID) {
                check_identifier(TRANSACTION_ID, transaction_id)?;
            }
            values.push((TRANSACTION_ID, transaction_id));
        }
        let path = definition.template.resolve(&values)?;

        let params = match (definition.params, params) {
            (ParamCapture::None, Some(params)) => {
                debug!("{self:?} takes no parameters, ignoring {} supplied", params.len());
                None
            }
            (ParamCapture::Required, None) => {
                return Err(OandaError::invalid_argument(format!("params are required for {self:?}")));
            }
            (_, params) => params,
        };

        Ok(Descriptor {
            endpoint: self,
            path,
            method: definition.method.clone(),
            params,
        })
    }
}

fn check_identifier(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(OandaError::invalid_argument(format!("{name} is required")));
    }
    let reserved = |c: char| matches!(c, '/' | '\\' | '{' | '}' | '?' | '#' | '%') || c.is_control();
    if matches!(value, "." | "..") || value.contains(reserved) {
        return Err(OandaError::invalid_argument(format!("{name} '{value}' cannot be used as a path segment")));
    }
    Ok(())
}

/// Resolved request: path, method and query parameters, ready to be handed to an executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    endpoint: Endpoint,
    path: String,
    method: Method,
    params: Option<Params>,
}

impl Descriptor {
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn template(&self) -> Template {
        self.endpoint.definition().template
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }

    pub fn is_stream(&self) -> bool {
        self.endpoint.definition().stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_indexed_by_endpoint() {
        for endpoint in Endpoint::ALL {
            assert_eq!(endpoint.definition().endpoint, endpoint);
            assert_eq!(endpoint.definition().method, Method::GET);
        }
        let streams = Endpoint::ALL.iter()
            .filter(|endpoint| endpoint.definition().stream)
            .collect::<Vec<_>>();
        assert_eq!(streams, vec![&Endpoint::TransactionsStream]);
    }

    #[test]
    fn test_template_placeholders() {
        let template = Endpoint::TransactionDetails.definition().template;
        assert_eq!(template.placeholders(), vec![ACCOUNT_ID, TRANSACTION_ID]);
        assert!(!Endpoint::TransactionList.definition().template.contains(TRANSACTION_ID));
    }

    #[test]
    fn test_unused_transaction_id_is_ignored() {
        let descriptor = Endpoint::TransactionList.build("A1", Some("T7"), None).unwrap();
        assert_eq!(descriptor.path(), "v3/accounts/A1/transactions");
    }

    #[test]
    fn test_missing_transaction_id_is_rejected() {
        let error = Endpoint::TransactionDetails.build("A1", None, None).unwrap_err();
        assert!(matches!(error, OandaError::InvalidArgument(message) if message.contains(TRANSACTION_ID)));
    }

    #[test]
    fn test_missing_account_id_is_rejected() {
        for endpoint in Endpoint::ALL {
            let error = endpoint.build(" ", Some("T7"), Some(Params::new())).unwrap_err();
            assert!(matches!(error, OandaError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_identifiers_breaking_the_path_are_rejected() {
        for account_id in ["A/1", "{accountID}", "A}"] {
            assert!(Endpoint::TransactionList.build(account_id, None, None).is_err());
        }
        assert!(Endpoint::TransactionDetails.build("A1", Some("../7"), None).is_err());
    }

    #[test]
    fn test_identifiers_reinterpreted_by_urls_are_rejected() {
        for transaction_id in [".", "..", "7?from=1", "7#top", "%2e%2e", "7\\8", "7\n"] {
            let error = Endpoint::TransactionDetails.build("A1", Some(transaction_id), None).unwrap_err();
            assert!(matches!(error, OandaError::InvalidArgument(_)), "{transaction_id:?}");
        }
        for account_id in ["A1#f", "A1?x", ".."] {
            assert!(Endpoint::TransactionList.build(account_id, None, None).is_err(), "{account_id:?}");
        }
        assert!(Endpoint::TransactionDetails.build("101-004-1", Some("6.410"), None).is_ok());
    }

    #[test]
    fn test_params_capture() {
        let params = Params::from([("id", "6")]);

        let details = Endpoint::TransactionDetails.build("A1", Some("T7"), Some(params.clone())).unwrap();
        assert_eq!(details.params(), None);

        let since_id = Endpoint::TransactionSinceId.build("A1", None, Some(params.clone())).unwrap();
        assert_eq!(since_id.params(), Some(&params));

        let error = Endpoint::TransactionSinceId.build("A1", None, None).unwrap_err();
        assert!(matches!(error, OandaError::InvalidArgument(_)));
    }

    #[test]
    fn test_extract_rejects_foreign_paths() {
        let template = Endpoint::TransactionDetails.definition().template;
        assert_eq!(template.extract("v3/accounts/A1/orders/T7"), None);
        assert_eq!(template.extract("v3/accounts/A1/transactions/"), None);
        assert_eq!(template.extract("v3/accounts/A1/transactions/T7/extra"), None);
    }
}
