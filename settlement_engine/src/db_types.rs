use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
pub use settlement_common::Money;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|e| ConversionError(format!("{s} is not a valid order id. {e}")))
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------        ItemId         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

//--------------------------------------       VoucherId       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct VoucherId(pub i64);

impl From<i64> for VoucherId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Display for VoucherId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "voucher#{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The order status lattice. Transitions only ever move forward:
///
/// ```text
///   created -> awaiting_payment -> { paid | cancelled | voucher_limit_failed }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been created at checkout. No payment has been initiated yet.
    Created,
    /// A payment request has been issued to the gateway and we are waiting for the outcome.
    AwaitingPayment,
    /// The gateway has reported the payment as complete and the side effects have been applied.
    Paid,
    /// The gateway reported the payment as expired.
    Cancelled,
    /// Settlement was refused because the order's voucher had reached its usage ceiling.
    VoucherLimitFailed,
}

impl OrderStatusType {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled | Self::VoucherLimitFailed)
    }

    /// Position in the lattice. Terminal states share the top rank.
    fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::AwaitingPayment => 1,
            Self::Paid | Self::Cancelled | Self::VoucherLimitFailed => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the monotonic lattice. Staying in the same non-terminal state is
    /// allowed (e.g. repeated "pending" notifications).
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self == next || next.rank() > self.rank()
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Created => write!(f, "created"),
            OrderStatusType::AwaitingPayment => write!(f, "awaiting_payment"),
            OrderStatusType::Paid => write!(f, "paid"),
            OrderStatusType::Cancelled => write!(f, "cancelled"),
            OrderStatusType::VoucherLimitFailed => write!(f, "voucher_limit_failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "awaiting_payment" => Ok(Self::AwaitingPayment),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            "voucher_limit_failed" => Ok(Self::VoucherLimitFailed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to created");
            OrderStatusType::Created
        })
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: i64,
    pub total_amount: Money,
    pub status: OrderStatusType,
    /// The correlation string sent to the gateway when payment was initiated.
    pub external_id: Option<String>,
    /// The gateway's own id for the payment.
    pub payment_id: Option<String>,
    /// Legacy single-item orders recorded the item directly on the order.
    pub primary_item_id: Option<ItemId>,
    pub payment_method: Option<String>,
    pub payment_channel: Option<String>,
    pub payer_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    /// The order value before any voucher discount is applied.
    pub subtotal: Money,
    pub primary_item_id: Option<ItemId>,
    pub voucher_code: Option<String>,
}

impl NewOrder {
    pub fn new(user_id: i64, subtotal: Money) -> Self {
        Self { user_id, subtotal, primary_item_id: None, voucher_code: None }
    }

    pub fn with_primary_item(mut self, item_id: ItemId) -> Self {
        self.primary_item_id = Some(item_id);
        self
    }

    pub fn with_voucher(mut self, code: &str) -> Self {
        self.voucher_code = Some(code.to_string());
        self
    }
}

//--------------------------------------     SellableItem      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SellableItem {
    pub id: ItemId,
    pub name: String,
    pub unit_price: Money,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSellableItem {
    pub name: String,
    pub unit_price: Money,
    pub stock: i64,
}

impl NewSellableItem {
    pub fn new<S: Into<String>>(name: S, unit_price: Money, stock: i64) -> Self {
        Self { name: name.into(), unit_price, stock }
    }
}

//--------------------------------------     DiscountType      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// `discount_value` is an absolute amount
    Fixed,
    /// `discount_value` is a percentage (0-100) of the order subtotal
    Percentage,
}

//--------------------------------------        Voucher        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub usage_count: i64,
    /// `None` means the voucher can be redeemed an unlimited number of times.
    pub usage_limit: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Voucher {
    /// True if at least one more redemption is allowed.
    pub fn has_capacity(&self) -> bool {
        self.usage_limit.map(|limit| self.usage_count < limit).unwrap_or(true)
    }

    /// The discount this voucher grants on the given subtotal. The discount never exceeds the subtotal.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        let subtotal = subtotal.value().max(0);
        let discount = match self.discount_type {
            DiscountType::Fixed => i128::from(self.discount_value),
            DiscountType::Percentage => i128::from(subtotal) * i128::from(self.discount_value.min(100)) / 100,
        };
        // Clamped to the subtotal, so the narrowing cannot fail
        let discount = i64::try_from(discount.clamp(0, i128::from(subtotal))).unwrap_or(subtotal);
        Money::from(discount)
    }
}

#[derive(Debug, Clone)]
pub struct NewVoucher {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub usage_limit: Option<i64>,
}

impl NewVoucher {
    pub fn fixed<S: Into<String>>(code: S, amount: Money) -> Self {
        Self { code: code.into(), discount_type: DiscountType::Fixed, discount_value: amount.value(), usage_limit: None }
    }

    pub fn percentage<S: Into<String>>(code: S, percent: i64) -> Self {
        Self { code: code.into(), discount_type: DiscountType::Percentage, discount_value: percent, usage_limit: None }
    }

    pub fn with_usage_limit(mut self, limit: i64) -> Self {
        self.usage_limit = Some(limit);
        self
    }
}

//--------------------------------------     OrderVoucher      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderVoucher {
    pub order_id: OrderId,
    pub voucher_id: VoucherId,
    pub discount_amount: Money,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       LineItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub user_id: i64,
    pub item_id: ItemId,
    /// `None` while the line is still part of the user's working selection.
    pub order_id: Option<OrderId>,
    pub quantity: i64,
    /// Captured when the item was selected.
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub user_id: i64,
    pub item_id: ItemId,
    pub quantity: i64,
}

impl NewLineItem {
    pub fn new(user_id: i64, item_id: ItemId, quantity: i64) -> Self {
        Self { user_id, item_id, quantity }
    }
}

//--------------------------------------    CheckoutRecord     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CheckoutRecord {
    pub id: i64,
    pub order_id: OrderId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCheckoutRecord {
    pub order_id: OrderId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub shipping_address: Option<String>,
}

impl NewCheckoutRecord {
    pub fn new(order_id: OrderId, item_id: ItemId, quantity: i64) -> Self {
        Self {
            order_id,
            item_id,
            quantity,
            recipient_name: None,
            recipient_phone: None,
            shipping_address: None,
        }
    }

    pub fn with_recipient(mut self, name: &str, phone: &str) -> Self {
        self.recipient_name = Some(name.to_string());
        self.recipient_phone = Some(phone.to_string());
        self
    }

    pub fn with_shipping_address(mut self, address: &str) -> Self {
        self.shipping_address = Some(address.to_string());
        self
    }
}

/// A checkout record joined with the sellable item it refers to.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CheckoutLine {
    pub order_id: OrderId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub unit_price: Money,
}

//--------------------------------------   SettlementUpdate    ---------------------------------------------------------
/// The set of order fields the settlement flow is allowed to write.
#[derive(Debug, Clone)]
pub struct SettlementUpdate {
    pub new_status: OrderStatusType,
    /// Only written if the order does not have a payment id yet.
    pub payment_id: Option<String>,
    pub payment_method: Option<String>,
    pub payment_channel: Option<String>,
    pub payer_email: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SettlementUpdate {
    pub fn new(new_status: OrderStatusType) -> Self {
        Self {
            new_status,
            payment_id: None,
            payment_method: None,
            payment_channel: None,
            payer_email: None,
            completed_at: None,
        }
    }

    pub fn with_payment_id(mut self, payment_id: Option<String>) -> Self {
        self.payment_id = payment_id;
        self
    }

    pub fn with_payment_method(mut self, method: Option<String>, channel: Option<String>) -> Self {
        self.payment_method = method;
        self.payment_channel = channel;
        self
    }

    pub fn with_payer_email(mut self, email: Option<String>) -> Self {
        self.payer_email = email;
        self
    }

    pub fn completed_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.completed_at = Some(timestamp);
        self
    }
}
