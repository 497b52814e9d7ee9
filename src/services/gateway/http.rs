use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;

use super::{PaymentGateway, PaymentInit, PaymentSession, PaymentVerification};

/// Gateway speaking the common `transaction/initialize` + `transaction/verify` API,
/// with amounts in minor currency units.
pub struct HttpPaymentGateway {
    base_url: String,
    secret_key: String,
    client: reqwest::Client,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, secret_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build gateway client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
            client,
        })
    }
}

fn to_minor_units(amount: Decimal) -> anyhow::Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| anyhow::anyhow!("amount out of range: {amount}"))
}

fn from_minor_units(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().map(|v| Decimal::new(v, 2)),
        serde_json::Value::String(s) => Decimal::from_str(s).ok().map(|v| v / Decimal::ONE_HUNDRED),
        _ => None,
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initialize_payment(&self, init: &PaymentInit) -> anyhow::Result<PaymentSession> {
        let body = json!({
            "amount": to_minor_units(init.amount)?,
            "reference": init.reference,
            "email": init.email,
            "metadata": init.metadata,
        });

        let resp = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .context("failed to call payment gateway")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse gateway response")?;

        if !status.is_success() || data["status"] != json!(true) {
            anyhow::bail!("gateway initialize failed ({}): {}", status, data);
        }

        let url = data["data"]["authorization_url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing authorization_url in gateway response"))?;

        Ok(PaymentSession {
            reference: init.reference.clone(),
            authorization_url: url.to_string(),
        })
    }

    async fn verify_payment(&self, reference: &str) -> anyhow::Result<PaymentVerification> {
        let resp = self
            .client
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("failed to call payment gateway")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse gateway response")?;

        if !status.is_success() {
            anyhow::bail!("gateway verify failed ({}): {}", status, data);
        }

        let tx = &data["data"];
        let amount = from_minor_units(&tx["amount"])
            .ok_or_else(|| anyhow::anyhow!("missing amount in gateway response"))?;

        Ok(PaymentVerification {
            reference: reference.to_string(),
            success: tx["status"].as_str() == Some("success"),
            amount,
            fees: from_minor_units(&tx["fees"]),
            transaction_id: match &tx["id"] {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            },
        })
    }
}
