use super::config;
use super::models::{AllIndices, ContractInfo, Instrument, OptionChain};
use crate::error::FetchError;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use rand::{seq::SliceRandom, thread_rng};
use reqwest::{header, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

// -----------------------------------------------
// CLIENT WRAPPER WITH SESSION STATE
// -----------------------------------------------
pub struct NseClient {
    client: Client,
    warmed_up: Arc<RwLock<bool>>,
}

/// Pick the nearest usable expiry.
///
/// Past expiries are skipped. Today's expiry is used only before the
/// 15:30 IST close; after that the next one is chosen.
pub fn select_expiry<'a>(
    expiry_dates: &'a [String],
    now: DateTime<FixedOffset>,
) -> Result<&'a String, FetchError> {
    let mut parsed: Vec<(NaiveDate, usize)> = Vec::with_capacity(expiry_dates.len());

    for (idx, s) in expiry_dates.iter().enumerate() {
        match NaiveDate::parse_from_str(s, config::EXPIRY_DATE_FORMAT) {
            Ok(d) => parsed.push((d, idx)),
            Err(e) => warn!(expiry = %s, error = %e, "skipping unparseable expiry date"),
        }
    }

    parsed.sort_by_key(|(d, _)| *d);

    let today = now.date_naive();
    let before_close = (now.hour(), now.minute())
        < (config::MARKET_CLOSE_HOUR, config::MARKET_CLOSE_MINUTE);

    for (date, idx) in parsed {
        if date > today || (date == today && before_close) {
            return Ok(&expiry_dates[idx]);
        }
    }

    Err(FetchError::NoValidExpiry)
}

pub fn ist_offset() -> FixedOffset {
    FixedOffset::east_opt(config::IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current wall-clock time in IST
pub fn ist_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&ist_offset())
}

impl NseClient {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client()?,
            warmed_up: Arc::new(RwLock::new(false)),
        })
    }

    /// Warmup NSE session (only once per client)
    async fn warmup_if_needed(&self) -> Result<(), FetchError> {
        if *self.warmed_up.read().await {
            return Ok(());
        }

        let mut warmed = self.warmed_up.write().await;
        if !*warmed {
            self.client
                .get(config::NSE_BASE_URL)
                .header("Accept", config::HEADER_ACCEPT_HTML)
                .send()
                .await
                .map_err(|e| FetchError::Request(format!("Failed to warm up NSE session: {}", e)))?;

            tokio::time::sleep(Duration::from_millis(config::WARMUP_DELAY_MS)).await;
            *warmed = true;
        }

        Ok(())
    }

    /// Fetch a JSON body with retries on rate limits, server errors and
    /// transport failures. Client errors fail fast.
    async fn fetch_json(&self, url: &str) -> Result<String, FetchError> {
        self.warmup_if_needed().await?;

        let backoff = ExponentialBackoff::from_millis(config::RETRY_BASE_DELAY_MS)
            .factor(config::RETRY_FACTOR)
            .max_delay(Duration::from_secs(config::RETRY_MAX_DELAY_SECS))
            .take(config::RETRY_MAX_ATTEMPTS);

        RetryIf::start(
            backoff,
            || async {
                let res = self
                    .client
                    .get(url)
                    .header("Referer", config::HEADER_REFERER)
                    .header("X-Requested-With", config::HEADER_X_REQUESTED_WITH)
                    .send()
                    .await?;

                let status = res.status();
                debug!(url, status = status.as_u16(), "NSE response");

                if status.is_success() {
                    let text = res.text().await?;

                    let trimmed = text.trim();
                    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
                        let preview: String = text.chars().take(200).collect();
                        return Err(FetchError::NonJsonResponse(preview));
                    }

                    Ok(text)
                } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    Err(FetchError::Retryable(status.to_string()))
                } else {
                    let body = res.text().await.unwrap_or_default();
                    Err(FetchError::Client {
                        status: status.as_u16(),
                        preview: body.chars().take(200).collect(),
                    })
                }
            },
            |e: &FetchError| {
                matches!(
                    e,
                    FetchError::Request(_) | FetchError::Retryable(_) | FetchError::NonJsonResponse(_)
                )
            },
        )
        .await
    }

    /// Expiry dates listed for an instrument
    pub async fn fetch_expiry_dates(&self, instrument: Instrument) -> Result<Vec<String>, FetchError> {
        let url = config::nse_contract_info_url(instrument.symbol());
        let text = self.fetch_json(&url).await?;
        let info: ContractInfo = serde_json::from_str(&text)?;

        Ok(info.expiry_dates)
    }

    /// Nearest live expiry for an instrument
    pub async fn fetch_nearest_expiry(&self, instrument: Instrument) -> Result<String, FetchError> {
        let dates = self.fetch_expiry_dates(instrument).await?;
        select_expiry(&dates, ist_now()).cloned()
    }

    pub async fn fetch_option_chain(
        &self,
        instrument: Instrument,
        expiry: &str,
    ) -> Result<OptionChain, FetchError> {
        let url = config::nse_option_chain_url(instrument.symbol(), expiry);
        let text = self.fetch_json(&url).await?;
        let chain: OptionChain = serde_json::from_str(&text)?;

        Ok(chain)
    }

    /// Spot price from the all-indices feed. `None` when the feed has no
    /// entry for the instrument's index.
    pub async fn fetch_spot_price(&self, instrument: Instrument) -> Result<Option<f64>, FetchError> {
        let text = self.fetch_json(config::NSE_API_ALL_INDICES).await?;
        let quotes: AllIndices = serde_json::from_str(&text)?;

        Ok(quotes.last_for(instrument.spot_index_name()))
    }
}

// -----------------------------------------------
// HTTP CLIENT BUILDER
// -----------------------------------------------
fn build_client() -> Result<Client, FetchError> {
    let mut headers = header::HeaderMap::new();

    let lang = config::ACCEPT_LANGUAGES
        .choose(&mut thread_rng())
        .copied()
        .unwrap_or("en-US,en;q=0.9");
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_str(lang).map_err(|e| FetchError::Request(e.to_string()))?,
    );
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));

    Ok(Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .user_agent(config::USER_AGENT)
        .timeout(config::HTTP_TIMEOUT)
        .build()?)
}
