//! Exchange rates for converting monetary inputs to rupees.
//!
//! Rates are quoted against EUR by exchangeratesapi.io. When the service
//! cannot be used a fixed fallback table is substituted.
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const RATES_ENDPOINT: &str = "https://api.exchangeratesapi.io/v1/latest";
pub const API_KEY_ENV: &str = "EXCHANGE_RATES_API_KEY";
pub const BASE_CURRENCY: &str = "EUR";
pub const TARGET_CURRENCY: &str = "INR";
/// Currencies offered to the user, in display order.
pub const CURRENCIES: [&str; 4] = ["GBP", "USD", "EUR", "INR"];

const SYMBOLS: [&str; 3] = ["USD", "GBP", "INR"];
const FALLBACK_RATES: [(&str, f64); 3] = [("USD", 1.14), ("GBP", 0.84), ("INR", 97.75)];
/// Used when the rate table has no INR quote.
const DEFAULT_INR_RATE: f64 = 105.0;

/// Source of EUR-based exchange rates.
pub trait RateProvider {
    fn fetch(&self) -> Result<BTreeMap<String, f64>>;
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    rates: BTreeMap<String, f64>,
}

fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
    })
}

/// exchangeratesapi.io client.
#[derive(Debug, Clone)]
pub struct ExchangeRatesApi {
    api_key: Option<String>,
    endpoint: String,
}

impl ExchangeRatesApi {
    pub fn new(api_key: Option<String>, endpoint: &str) -> Self {
        Self {
            api_key,
            endpoint: endpoint.to_string(),
        }
    }

    /// Client keyed from `EXCHANGE_RATES_API_KEY`.
    pub fn from_env() -> Self {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
        Self::new(api_key, RATES_ENDPOINT)
    }
}

impl RateProvider for ExchangeRatesApi {
    fn fetch(&self) -> Result<BTreeMap<String, f64>> {
        let api_key = self
            .api_key
            .as_deref()
            .with_context(|| format!("{} is not set", API_KEY_ENV))?;
        let response = agent()
            .get(&self.endpoint)
            .query("access_key", api_key)
            .query("base", BASE_CURRENCY)
            .query("symbols", &SYMBOLS.join(","))
            .call()
            .context("Exchange rate request failed")?;
        if response.status() != 200 {
            anyhow::bail!("Exchange rate service answered with status {}", response.status());
        }
        let body: RatesResponse = response
            .into_json()
            .context("Exchange rate response is not valid JSON")?;
        if !body.success {
            anyhow::bail!("Exchange rate service reported failure");
        }
        Ok(body.rates)
    }
}

/// Provider that never reaches the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl RateProvider for Offline {
    fn fetch(&self) -> Result<BTreeMap<String, f64>> {
        anyhow::bail!("offline mode")
    }
}

/// EUR-based rates plus whether they came from the live service.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRates {
    pub rates: BTreeMap<String, f64>,
    pub live: bool,
}

impl ConversionRates {
    pub fn fallback() -> Self {
        Self {
            rates: FALLBACK_RATES
                .iter()
                .map(|(currency, rate)| (currency.to_string(), *rate))
                .collect(),
            live: false,
        }
    }

    /// Multiplier taking an amount in `currency` to INR.
    ///
    /// INR amounts are unchanged; currencies without a quote (EUR, the base)
    /// count as rate 1.
    pub fn factor_to_inr(&self, currency: &str) -> f64 {
        if currency == TARGET_CURRENCY {
            return 1.0;
        }
        let inr = self.rates.get(TARGET_CURRENCY).copied().unwrap_or(DEFAULT_INR_RATE);
        let user = self.rates.get(currency).copied().unwrap_or(1.0);
        inr / user
    }

    pub fn convert(&self, amount: f64, currency: &str) -> f64 {
        amount * self.factor_to_inr(currency)
    }

    /// Lines describing the rates in use.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![format!("Conversion rates (base: {})", BASE_CURRENCY)];
        lines.extend(
            self.rates
                .iter()
                .map(|(currency, rate)| format!("  1 {} = {} {}", BASE_CURRENCY, rate, currency)),
        );
        lines.push(if self.live {
            "Live rates fetched".to_string()
        } else {
            "Using fallback conversion rates".to_string()
        });
        lines
    }
}

/// Live rates when available, otherwise the fallback table.
pub fn resolve_rates(provider: &dyn RateProvider) -> ConversionRates {
    match provider.fetch() {
        Ok(rates) if !rates.is_empty() => {
            log::info!("fetched {} live exchange rates", rates.len());
            ConversionRates { rates, live: true }
        }
        Ok(_) => {
            log::warn!("exchange rate service returned no rates; using fallback rates");
            ConversionRates::fallback()
        }
        Err(e) => {
            log::warn!("using fallback exchange rates: {:#}", e);
            ConversionRates::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_fails_without_network() {
        let api = ExchangeRatesApi::new(None, "http://127.0.0.1:9/unused");
        assert!(api.fetch().is_err());
        assert!(!resolve_rates(&api).live);
    }

    #[test]
    fn eur_uses_inr_rate_directly() {
        let rates = ConversionRates::fallback();
        assert!((rates.factor_to_inr("EUR") - 97.75).abs() < 1e-12);
        assert_eq!(rates.factor_to_inr("INR"), 1.0);
    }
}
