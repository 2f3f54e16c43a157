use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use settlement_common::Secret;

use crate::{
    db_types::{Money, OrderStatusType},
    settlement_api::errors::SettlementError,
};

/// The payment outcome reported by the gateway. Parsing is case-insensitive; anything that is not recognised is kept
/// verbatim as [`GatewayStatus::Other`] and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Paid,
    Settled,
    Expired,
    Pending,
    Other(String),
}

impl GatewayStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "PAID" => Self::Paid,
            "SETTLED" => Self::Settled,
            "EXPIRED" => Self::Expired,
            "PENDING" => Self::Pending,
            _ => Self::Other(s.trim().to_string()),
        }
    }

    /// Maps the gateway's status onto the order status lattice, given the order's current (non-terminal) status.
    ///
    /// * paid / settled -> `paid`
    /// * expired -> `cancelled`
    /// * anything else is a pending state. A freshly created order moves to `awaiting_payment`; otherwise the status is
    ///   left as it is.
    pub fn target_status(&self, current: OrderStatusType) -> OrderStatusType {
        match self {
            Self::Paid | Self::Settled => OrderStatusType::Paid,
            Self::Expired => OrderStatusType::Cancelled,
            Self::Pending | Self::Other(_) => match current {
                OrderStatusType::Created => OrderStatusType::AwaitingPayment,
                other => other,
            },
        }
    }
}

impl Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paid => write!(f, "PAID"),
            Self::Settled => write!(f, "SETTLED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Pending => write!(f, "PENDING"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// An invoice callback as delivered by the payment gateway.
///
/// Every field is optional at this level, so that a structurally valid but incomplete payload can still be parsed and
/// rejected with a meaningful error by [`InvoiceNotification::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceNotification {
    /// The gateway's payment id
    #[serde(default, rename = "id")]
    pub payment_id: Option<String>,
    /// The correlation string supplied when the payment was requested
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: Option<i64>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payer_email: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_channel: Option<String>,
}

/// Gateways send amounts as integers, floats (`150000.0`) or strings. Only whole amounts are accepted.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where D: Deserializer<'de> {
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_i64() {
                Ok(Some(v))
            } else {
                match n.as_f64() {
                    #[allow(clippy::cast_possible_truncation)]
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Some(f as i64)),
                    _ => Err(de::Error::custom(format!("{n} is not a whole amount"))),
                }
            }
        },
        Some(Value::String(s)) => {
            s.trim().parse::<i64>().map(Some).map_err(|e| de::Error::custom(format!("{s} is not an amount. {e}")))
        },
        Some(other) => Err(de::Error::custom(format!("{other} is not an amount"))),
    }
}

impl InvoiceNotification {
    pub fn new(status: &str) -> Self {
        Self { status: Some(status.to_string()), ..Default::default() }
    }

    pub fn from_json(payload: &str) -> Result<Self, SettlementError> {
        serde_json::from_str(payload).map_err(|e| SettlementError::MalformedNotification(e.to_string()))
    }

    pub fn with_payment_id(mut self, payment_id: &str) -> Self {
        self.payment_id = Some(payment_id.to_string());
        self
    }

    pub fn with_external_id(mut self, external_id: &str) -> Self {
        self.external_id = Some(external_id.to_string());
        self
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_paid_at(mut self, paid_at: DateTime<Utc>) -> Self {
        self.paid_at = Some(paid_at);
        self
    }

    pub fn with_payer_email(mut self, email: &str) -> Self {
        self.payer_email = Some(email.to_string());
        self
    }

    pub fn with_payment_method(mut self, method: &str, channel: &str) -> Self {
        self.payment_method = Some(method.to_string());
        self.payment_channel = Some(channel.to_string());
        self
    }

    /// Checks the required fields. This never touches the store.
    ///
    /// A notification is malformed if
    /// * it has no status,
    /// * it carries neither a payment id nor a correlation string (there would be no way to find the order), or
    /// * the amount is negative.
    ///
    /// Blank strings are treated as missing.
    pub fn validate(&self) -> Result<ValidatedNotification, SettlementError> {
        let status = non_blank(&self.status)
            .map(|s| GatewayStatus::parse(&s))
            .ok_or_else(|| SettlementError::MalformedNotification("The notification has no status".to_string()))?;
        let payment_id = non_blank(&self.payment_id);
        let external_id = non_blank(&self.external_id);
        if payment_id.is_none() && external_id.is_none() {
            return Err(SettlementError::MalformedNotification(
                "The notification carries neither a payment id nor an external id".to_string(),
            ));
        }
        let amount = self.amount.map(Money::from);
        if let Some(a) = amount.filter(|a| a.is_negative()) {
            return Err(SettlementError::MalformedNotification(format!("Negative amount: {a}")));
        }
        Ok(ValidatedNotification {
            payment_id,
            external_id,
            status,
            amount,
            paid_at: self.paid_at,
            payer_email: non_blank(&self.payer_email).map(Secret::new),
            payment_method: non_blank(&self.payment_method),
            payment_channel: non_blank(&self.payment_channel),
        })
    }
}

fn non_blank(s: &Option<String>) -> Option<String> {
    s.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()).map(String::from)
}

/// A notification that has passed [`InvoiceNotification::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedNotification {
    pub payment_id: Option<String>,
    pub external_id: Option<String>,
    pub status: GatewayStatus,
    pub amount: Option<Money>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payer_email: Option<Secret<String>>,
    pub payment_method: Option<String>,
    pub payment_channel: Option<String>,
}
