use anyhow::Result;
use futures::StreamExt;
use serde_json::Value;
use tokio::select;
use tracing::{debug, info, trace, warn};

use oanda_eac::OandaError;
use oanda_eac::rest::{OandaRest, Params, Request, TransactionList, TransactionsStream};
use transactions_config::CONFIG;

const HEARTBEAT: &str = "HEARTBEAT";

#[derive(Debug)]
pub enum Outcome {
    /// Stopped through the terminator, by the user or the event limit.
    Terminated { reason: String, events: u64 },
    /// Server closed the stream.
    Exhausted { events: u64 },
    Failed { error: OandaError, events: u64 },
}

pub async fn run() -> Result<Outcome> {
    let oanda = &CONFIG.oanda;
    info!("+ {} running for account '{}'", CONFIG.application.name, oanda.account_id);
    let client = OandaRest::with_token(&oanda.rest.url, &oanda.stream.url, &oanda.auth.token);

    let params = Params::new().with("pageSize", CONFIG.streaming.page_size);
    let mut list = TransactionList::new(&oanda.account_id, Some(params))?;
    client.request(&mut list).await?;
    if let Some(page) = list.response() {
        log_page(page);
    }

    let mut stream = TransactionsStream::new(&oanda.account_id, None)?;
    client.stream(&mut stream).await?;
    let terminator = stream.terminator();
    let mut consumer = tokio::spawn(consume(stream, CONFIG.streaming.max_events));

    let outcome = select! {
        outcome = &mut consumer => outcome?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, terminating transactions stream");
            if let Err(error) = terminator.terminate(Some("interrupted by user")) {
                warn!("Cannot terminate transactions stream: {error}");
            }
            consumer.await?
        }
    };
    Ok(outcome)
}

fn log_page(page: &Value) {
    let pages = page["pages"].as_array().map_or(0, Vec::len);
    info!("Account has {} transactions in {pages} pages, last id: {}", page["count"], page["lastTransactionID"]);
    trace!("Transactions page: {page}");
}

pub(crate) async fn consume(mut request: TransactionsStream, max_events: u64) -> Outcome {
    let terminator = request.terminator();
    let mut events = 0;
    let Some(stream) = request.response_mut() else {
        return Outcome::Failed { error: OandaError::InvalidState(oanda_eac::NO_STREAM_RESPONSE.to_string()), events };
    };

    while let Some(event) = stream.next().await {
        match event {
            Ok(event) if event["type"] == HEARTBEAT => trace!("Heartbeat, last transaction id: {}", event["lastTransactionID"]),
            Ok(event) => {
                events += 1;
                info!("Transaction {} of type {}", event["id"], event["type"]);
                debug!("Transaction: {event}");
                if max_events > 0 && events == max_events {
                    if let Err(error) = terminator.terminate(Some("event limit reached")) {
                        warn!("Cannot terminate transactions stream: {error}");
                    }
                }
            }
            Err(OandaError::StreamTerminated(reason)) => return Outcome::Terminated { reason, events },
            Err(error) => return Outcome::Failed { error, events },
        }
    }
    Outcome::Exhausted { events }
}
