use serde_json::Value;

use crate::error::Result;
use crate::stream::{StreamState, StreamTerminator, TransactionStream};

use super::{Descriptor, Endpoint, Params, Request};

macro_rules! impl_request {
    ($request:ty, $endpoint:expr) => {
        impl Request for $request {
            const ENDPOINT: Endpoint = $endpoint;
            type Response = Value;

            fn descriptor(&self) -> &Descriptor {
                &self.descriptor
            }

            fn response(&self) -> Option<&Value> {
                self.response.as_ref()
            }

            fn set_response(&mut self, response: Value) {
                self.response = Some(response);
            }
        }
    };
}

/// Pages of transactions matching a time based query
/// (`from`, `to`, `pageSize`, `type`).
#[derive(Clone, Debug)]
pub struct TransactionList {
    descriptor: Descriptor,
    response: Option<Value>,
}

impl TransactionList {
    pub fn new(account_id: &str, params: Option<Params>) -> Result<Self> {
        Ok(Self {
            descriptor: Self::ENDPOINT.build(account_id, None, params)?,
            response: None,
        })
    }
}

impl_request!(TransactionList, Endpoint::TransactionList);

/// Details of a single account transaction.
#[derive(Clone, Debug)]
pub struct TransactionDetails {
    descriptor: Descriptor,
    response: Option<Value>,
}

impl TransactionDetails {
    pub fn new(account_id: &str, transaction_id: &str) -> Result<Self> {
        Ok(Self {
            descriptor: Self::ENDPOINT.build(account_id, Some(transaction_id), None)?,
            response: None,
        })
    }
}

impl_request!(TransactionDetails, Endpoint::TransactionDetails);

/// Range of transactions selected by id (`from`, `to`, `type`).
#[derive(Clone, Debug)]
pub struct TransactionIdRange {
    descriptor: Descriptor,
    response: Option<Value>,
}

impl TransactionIdRange {
    pub fn new(account_id: &str, params: Params) -> Result<Self> {
        Ok(Self {
            descriptor: Self::ENDPOINT.build(account_id, None, Some(params))?,
            response: None,
        })
    }
}

impl_request!(TransactionIdRange, Endpoint::TransactionIdRange);

/// Transactions after (not including) the given `id`.
#[derive(Clone, Debug)]
pub struct TransactionSinceId {
    descriptor: Descriptor,
    response: Option<Value>,
}

impl TransactionSinceId {
    pub fn new(account_id: &str, params: Params) -> Result<Self> {
        Ok(Self {
            descriptor: Self::ENDPOINT.build(account_id, None, Some(params))?,
            response: None,
        })
    }
}

impl_request!(TransactionSinceId, Endpoint::TransactionSinceId);

/// Live stream of account transactions, starting when the request is made.
///
/// The executor attaches a [`TransactionStream`]; [`TransactionsStream::terminate`]
/// or a [`StreamTerminator`] taken beforehand stops it from another task.
pub struct TransactionsStream {
    descriptor: Descriptor,
    terminator: StreamTerminator,
    response: Option<TransactionStream>,
}

impl TransactionsStream {
    pub fn new(account_id: &str, params: Option<Params>) -> Result<Self> {
        Ok(Self {
            descriptor: Self::ENDPOINT.build(account_id, None, params)?,
            terminator: StreamTerminator::new(),
            response: None,
        })
    }

    pub fn terminator(&self) -> StreamTerminator {
        self.terminator.clone()
    }

    pub fn state(&self) -> StreamState {
        self.terminator.state()
    }

    pub fn terminate(&self, reason: Option<&str>) -> Result<()> {
        self.terminator.terminate(reason)
    }

    pub fn response_mut(&mut self) -> Option<&mut TransactionStream> {
        self.response.as_mut()
    }
}

impl Request for TransactionsStream {
    const ENDPOINT: Endpoint = Endpoint::TransactionsStream;
    type Response = TransactionStream;

    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn response(&self) -> Option<&TransactionStream> {
        self.response.as_ref()
    }

    fn set_response(&mut self, response: TransactionStream) {
        self.response = Some(self.terminator.bind(response));
    }
}
