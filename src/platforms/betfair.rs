//! Betfair Exchange integration.
//!
//! Places straight-up roulette wagers as BACK orders on Betfair's in-play
//! roulette markets. Uses the Betfair Exchange API (JSON over REST).
//!
//! Betting API base: https://api.betfair.com/exchange/betting/rest/v1.0/
//! Auth: https://identitysso.betfair.com/api/login
//!
//! Auth requires: App Key + session token (obtained via username/password login).
//! Headers: `X-Application: {app_key}`, `X-Authentication: {session_token}`
//!
//! Each roulette market has one runner per pocket. Runner selection ids are
//! mapped to pocket numbers through a [`SelectionMap`]. A winning pocket is
//! the runner whose status becomes `WINNER` once the market settles.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::ExchangeGateway;
use crate::config::{AppConfig, BetfairConfig};
use crate::types::{d, is_valid_number, PlacementReceipt, Wager, MAX_NUMBER};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const AUTH_URL: &str = "https://identitysso.betfair.com/api/login";
const LOGOUT_URL: &str = "https://identitysso.betfair.com/api/logout";
const BETTING_URL: &str = "https://api.betfair.com/exchange/betting/rest/v1.0";
const PLATFORM_NAME: &str = "betfair";

/// Maximum markets to fetch per catalogue request.
const MARKET_FETCH_LIMIT: u32 = 100;

const ROULETTE_MARKET_TYPE: &str = "ROULETTE";

/// Decimal odds for a straight-up hit: 35 to 1 plus the stake.
pub const DEFAULT_BACK_PRICE: Decimal = dec!(36.0);

/// Selection id of pocket 0 on Betfair roulette markets.
pub const DEFAULT_SELECTION_BASE: u64 = 47972;

// ---------------------------------------------------------------------------
// Selection mapping
// ---------------------------------------------------------------------------

/// Maps pocket numbers to runner selection ids and back.
///
/// Pockets are laid out contiguously: pocket `n` is `base + n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionMap {
    base: u64,
}

impl Default for SelectionMap {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTION_BASE)
    }
}

impl SelectionMap {
    pub fn new(base: u64) -> Self {
        Self { base }
    }

    pub fn selection_id(&self, number: u8) -> Option<u64> {
        is_valid_number(number).then(|| self.base + u64::from(number))
    }

    pub fn number(&self, selection_id: u64) -> Option<u8> {
        let offset = selection_id.checked_sub(self.base)?;
        (offset <= u64::from(MAX_NUMBER)).then_some(offset as u8)
    }
}

// ---------------------------------------------------------------------------
// Betfair API types
// ---------------------------------------------------------------------------

/// Login response from the SSO endpoint.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "sessionToken")]
    session_token: Option<String>,
    #[serde(rename = "loginStatus")]
    login_status: String,
}

/// Logout / keep-alive response from the SSO endpoint.
#[derive(Debug, Deserialize)]
struct SessionResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// Market catalogue entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketCatalogue {
    market_id: String,
    market_name: String,
    #[serde(default)]
    event: Option<EventInfo>,
    #[serde(default)]
    total_matched: Option<f64>,
    #[serde(default)]
    market_start_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventInfo {
    #[serde(default)]
    name: Option<String>,
}

/// Market book (live prices and runner status).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketBook {
    market_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    inplay: Option<bool>,
    #[serde(default)]
    total_matched: Option<f64>,
    #[serde(default)]
    runners: Vec<RunnerBook>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunnerBook {
    selection_id: u64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    last_price_traded: Option<f64>,
    #[serde(default)]
    ex: Option<ExchangePrices>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangePrices {
    #[serde(default)]
    available_to_back: Vec<PriceSize>,
}

#[derive(Debug, Deserialize)]
struct PriceSize {
    price: f64,
    #[allow(dead_code)]
    size: f64,
}

/// Place orders response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrdersResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    instruction_reports: Vec<InstructionReport>,
    #[serde(default)]
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstructionReport {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    bet_id: Option<String>,
    #[serde(default)]
    placed_date: Option<String>,
    #[serde(default)]
    average_price_matched: Option<f64>,
    #[serde(default)]
    size_matched: Option<f64>,
}

/// Current orders response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentOrdersResponse {
    #[serde(default)]
    current_orders: Vec<CurrentOrder>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentOrder {
    bet_id: String,
    market_id: String,
    selection_id: u64,
    side: String,
    #[serde(default)]
    price_size: Option<PriceSize>,
    #[serde(default)]
    size_matched: Option<f64>,
    #[serde(default)]
    size_remaining: Option<f64>,
    #[serde(default)]
    placed_date: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

// ---------------------------------------------------------------------------
// Public views
// ---------------------------------------------------------------------------

/// An in-play roulette market.
#[derive(Debug, Clone, Serialize)]
pub struct RouletteMarket {
    pub market_id: String,
    pub market_name: String,
    pub event_name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub total_matched: Decimal,
}

/// One pocket's runner in a market book.
#[derive(Debug, Clone, Serialize)]
pub struct PocketRunner {
    pub selection_id: u64,
    pub number: Option<u8>,
    pub status: Option<String>,
    pub best_back_price: Option<Decimal>,
    pub last_price_traded: Option<Decimal>,
}

/// Snapshot of a roulette market book.
#[derive(Debug, Clone, Serialize)]
pub struct RouletteBook {
    pub market_id: String,
    pub status: Option<String>,
    pub inplay: bool,
    pub total_matched: Decimal,
    /// Pocket of the runner marked `WINNER`, once settled.
    pub winning_number: Option<u8>,
    pub runners: Vec<PocketRunner>,
}

impl RouletteBook {
    pub fn is_closed(&self) -> bool {
        self.status.as_deref() == Some("CLOSED")
    }
}

/// An order still live on the exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeOrder {
    pub bet_id: String,
    pub market_id: String,
    pub selection_id: u64,
    pub number: Option<u8>,
    pub side: String,
    pub price: Option<Decimal>,
    pub size_matched: Decimal,
    pub size_remaining: Decimal,
    pub status: Option<String>,
    pub placed_date: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Betfair Exchange client.
pub struct BetfairClient {
    http: Client,
    app_key: String,
    username: String,
    password: SecretString,
    session_token: RwLock<Option<String>>,
    selections: SelectionMap,
    back_price: Decimal,
}

impl BetfairClient {
    /// Create a client from the `[betfair]` config section.
    ///
    /// Credentials are read from the environment variables the section
    /// names (by default `BETFAIR_APP_KEY`, `BETFAIR_USERNAME` and
    /// `BETFAIR_PASSWORD`).
    pub fn from_config(config: &BetfairConfig) -> Result<Self> {
        let app_key = AppConfig::resolve_env(&config.app_key_env)?;
        let username = AppConfig::resolve_env(&config.username_env)?;
        let password = SecretString::new(AppConfig::resolve_env(&config.password_env)?);

        Self::with_credentials(app_key, username, password, config)
    }

    /// Create a client with explicit credentials.
    pub fn with_credentials(
        app_key: String,
        username: String,
        password: SecretString,
        config: &BetfairConfig,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("lc-automator/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for Betfair")?;

        Ok(Self {
            http,
            app_key,
            username,
            password,
            session_token: RwLock::new(None),
            selections: SelectionMap::new(config.selection_id_base),
            back_price: config.back_price,
        })
    }

    pub fn selections(&self) -> SelectionMap {
        self.selections
    }

    // -- Authentication ----------------------------------------------------

    /// Authenticate with Betfair SSO and store the session token.
    pub async fn login(&self) -> Result<()> {
        info!("Authenticating with Betfair...");

        let resp = self
            .http
            .post(AUTH_URL)
            .header("X-Application", &self.app_key)
            .header("Accept", "application/json")
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.expose_secret().as_str()),
            ])
            .send()
            .await
            .context("Betfair login request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Betfair login failed {status}: {body}");
        }

        let login: LoginResponse = resp
            .json()
            .await
            .context("Failed to parse Betfair login response")?;

        if login.login_status != "SUCCESS" {
            anyhow::bail!("Betfair login rejected: {}", login.login_status);
        }

        let token = login
            .session_token
            .context("Betfair login succeeded but no session token returned")?;

        *self.session_token.write().await = Some(token);

        info!("Betfair authentication successful");
        Ok(())
    }

    /// End the current session, if any.
    pub async fn logout(&self) -> Result<()> {
        let Some(token) = self.session_token.write().await.take() else {
            return Ok(());
        };

        let resp = self
            .http
            .post(LOGOUT_URL)
            .header("X-Application", &self.app_key)
            .header("X-Authentication", &token)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Betfair logout request failed")?;

        let body: SessionResponse = resp
            .json()
            .await
            .context("Failed to parse Betfair logout response")?;

        if body.status != "SUCCESS" {
            anyhow::bail!(
                "Betfair logout rejected: {}",
                body.error.unwrap_or(body.status)
            );
        }

        info!("Logged out from Betfair");
        Ok(())
    }

    pub async fn is_logged_in(&self) -> bool {
        self.session_token.read().await.is_some()
    }

    /// Get a valid session token, logging in if necessary.
    async fn ensure_session(&self) -> Result<String> {
        if let Some(token) = self.session_token.read().await.clone() {
            return Ok(token);
        }
        self.login().await?;
        self.session_token
            .read()
            .await
            .clone()
            .context("Session token missing after login")
    }

    // -- API helpers -------------------------------------------------------

    async fn post_betting(
        &self,
        url: &str,
        token: &str,
        body: &serde_json::Value,
    ) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(url)
            .header("X-Application", &self.app_key)
            .header("X-Authentication", token)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
    }

    /// Make an authenticated POST to the Betfair Betting API.
    ///
    /// An expired session (401) triggers one re-login and retry.
    async fn betting_api<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let token = self.ensure_session().await?;
        let url = format!("{BETTING_URL}/{endpoint}/");

        debug!(url = %url, "Betfair API request");

        let mut resp = self
            .post_betting(&url, &token, body)
            .await
            .with_context(|| format!("Betfair {endpoint} request failed"))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            *self.session_token.write().await = None;
            warn!("Betfair session expired, re-authenticating...");
            let token = self.ensure_session().await?;

            resp = self
                .post_betting(&url, &token, body)
                .await
                .with_context(|| format!("Betfair {endpoint} retry failed"))?;
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Betfair {endpoint} error {status}: {body_text}");
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse Betfair {endpoint} response"))
    }

    // -- Markets -----------------------------------------------------------

    /// In-play roulette markets, most traded first.
    pub async fn list_roulette_markets(&self) -> Result<Vec<RouletteMarket>> {
        let body = serde_json::json!({
            "filter": {
                "marketTypeCodes": [ROULETTE_MARKET_TYPE],
                "inPlayOnly": true
            },
            "maxResults": MARKET_FETCH_LIMIT,
            "marketProjection": ["EVENT", "MARKET_START_TIME", "MARKET_DESCRIPTION"],
            "sort": "MAXIMUM_TRADED"
        });

        let catalogues: Vec<MarketCatalogue> =
            self.betting_api("listMarketCatalogue", &body).await?;
        let markets: Vec<RouletteMarket> = catalogues.into_iter().map(to_roulette_market).collect();

        info!(count = markets.len(), "Fetched Betfair roulette markets");
        Ok(markets)
    }

    /// Current book for one market, `None` if Betfair returns nothing.
    pub async fn market_book(&self, market_id: &str) -> Result<Option<RouletteBook>> {
        let body = serde_json::json!({
            "marketIds": [market_id],
            "priceProjection": {
                "priceData": ["EX_BEST_OFFERS", "EX_TRADED"],
                "virtualise": false
            }
        });

        let books: Vec<MarketBook> = self.betting_api("listMarketBook", &body).await?;
        Ok(books
            .into_iter()
            .next()
            .map(|book| to_roulette_book(book, &self.selections)))
    }

    // -- Orders ------------------------------------------------------------

    /// Back a single pocket at the configured price.
    pub async fn place_back(&self, market_id: &str, wager: &Wager) -> Result<PlacementReceipt> {
        let selection_id = self
            .selections
            .selection_id(wager.number)
            .with_context(|| format!("No selection id for pocket {}", wager.number))?;

        let body = back_order_body(market_id, selection_id, wager.amount, self.back_price);
        let resp: PlaceOrdersResponse = self.betting_api("placeOrders", &body).await?;
        let receipt = interpret_place_response(resp, market_id, wager, self.back_price)?;

        info!(
            order_id = %receipt.order_id,
            market_id = %market_id,
            number = wager.number,
            amount = %wager.amount,
            price = %receipt.price,
            "Betfair order placed"
        );

        Ok(receipt)
    }

    /// Executable orders, optionally limited to one market.
    pub async fn current_orders(&self, market_id: Option<&str>) -> Result<Vec<ExchangeOrder>> {
        let body = match market_id {
            Some(id) => serde_json::json!({ "marketIds": [id], "orderProjection": "EXECUTABLE" }),
            None => serde_json::json!({ "orderProjection": "EXECUTABLE" }),
        };

        let resp: CurrentOrdersResponse = self.betting_api("listCurrentOrders", &body).await?;
        Ok(resp
            .current_orders
            .into_iter()
            .map(|order| to_exchange_order(order, &self.selections))
            .collect())
    }
}

#[async_trait]
impl ExchangeGateway for BetfairClient {
    async fn place_wager(&self, market_id: &str, wager: &Wager) -> Result<PlacementReceipt> {
        self.place_back(market_id, wager).await
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn to_roulette_market(catalogue: MarketCatalogue) -> RouletteMarket {
    RouletteMarket {
        event_name: catalogue
            .event
            .and_then(|e| e.name)
            .unwrap_or_else(|| "Unknown".to_string()),
        start_time: parse_time(catalogue.market_start_time.as_deref()),
        total_matched: d(catalogue.total_matched.unwrap_or(0.0)),
        market_id: catalogue.market_id,
        market_name: catalogue.market_name,
    }
}

/// Pocket of the runner Betfair has marked as the winner.
fn winning_number(book: &MarketBook, selections: &SelectionMap) -> Option<u8> {
    book.runners
        .iter()
        .find(|r| r.status.as_deref() == Some("WINNER"))
        .and_then(|r| selections.number(r.selection_id))
}

fn to_roulette_book(book: MarketBook, selections: &SelectionMap) -> RouletteBook {
    let winning_number = winning_number(&book, selections);
    let runners = book
        .runners
        .iter()
        .map(|r| PocketRunner {
            selection_id: r.selection_id,
            number: selections.number(r.selection_id),
            status: r.status.clone(),
            best_back_price: r
                .ex
                .as_ref()
                .and_then(|ex| ex.available_to_back.first())
                .map(|p| d(p.price)),
            last_price_traded: r.last_price_traded.map(d),
        })
        .collect();

    RouletteBook {
        market_id: book.market_id,
        status: book.status,
        inplay: book.inplay.unwrap_or(false),
        total_matched: d(book.total_matched.unwrap_or(0.0)),
        winning_number,
        runners,
    }
}

fn to_exchange_order(order: CurrentOrder, selections: &SelectionMap) -> ExchangeOrder {
    ExchangeOrder {
        number: selections.number(order.selection_id),
        price: order.price_size.as_ref().map(|p| d(p.price)),
        size_matched: d(order.size_matched.unwrap_or(0.0)),
        size_remaining: d(order.size_remaining.unwrap_or(0.0)),
        placed_date: parse_time(order.placed_date.as_deref()),
        bet_id: order.bet_id,
        market_id: order.market_id,
        selection_id: order.selection_id,
        side: order.side,
        status: order.status,
    }
}

/// `placeOrders` body for a LIMIT back order. With `LAPSE` persistence any
/// unmatched part is cancelled when the market suspends for the spin.
fn back_order_body(
    market_id: &str,
    selection_id: u64,
    amount: Decimal,
    price: Decimal,
) -> serde_json::Value {
    serde_json::json!({
        "marketId": market_id,
        "instructions": [{
            "orderType": "LIMIT",
            "selectionId": selection_id,
            "side": "BACK",
            "limitOrder": {
                "size": amount.to_f64().unwrap_or(0.0),
                "price": price.to_f64().unwrap_or(0.0),
                "persistenceType": "LAPSE"
            }
        }]
    })
}

/// Turn a `placeOrders` response into a receipt, or an error describing
/// why Betfair refused the order.
fn interpret_place_response(
    resp: PlaceOrdersResponse,
    market_id: &str,
    wager: &Wager,
    requested_price: Decimal,
) -> Result<PlacementReceipt> {
    if let Some(ref error_code) = resp.error_code {
        anyhow::bail!("Betfair placeOrders error: {error_code}");
    }

    let report = resp
        .instruction_reports
        .into_iter()
        .next()
        .context("No instruction report in placeOrders response")?;

    if resp.status.as_deref() != Some("SUCCESS") || report.status.as_deref() == Some("FAILURE") {
        let instruction_error = report.error_code.as_deref().unwrap_or("UNKNOWN");
        anyhow::bail!("Betfair order failed: {instruction_error}");
    }

    let order_id = report
        .bet_id
        .context("Betfair accepted the order but returned no bet id")?;

    Ok(PlacementReceipt {
        order_id,
        market_id: market_id.to_string(),
        platform: PLATFORM_NAME.to_string(),
        number: wager.number,
        amount: wager.amount,
        price: report
            .average_price_matched
            .filter(|p| *p > 0.0)
            .map(d)
            .unwrap_or(requested_price),
        size_matched: d(report.size_matched.unwrap_or(0.0)),
        timestamp: parse_time(report.placed_date.as_deref()).unwrap_or_else(Utc::now),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
