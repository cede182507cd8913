use serde::{Deserialize, Serialize};

/// One ordinal position in the fixed booking lifecycle. The derived `Ord`
/// follows declaration order, which is the pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Quote,
    Booking,
    Payment,
    Finance,
    Allotment,
    Pdi,
    Insurance,
    Registration,
    Compliance,
    Delivery,
    Delivered,
    Feedback,
}

impl Stage {
    pub const fn ordered() -> [Self; 12] {
        [
            Self::Quote,
            Self::Booking,
            Self::Payment,
            Self::Finance,
            Self::Allotment,
            Self::Pdi,
            Self::Insurance,
            Self::Registration,
            Self::Compliance,
            Self::Delivery,
            Self::Delivered,
            Self::Feedback,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Quote => "QUOTE",
            Self::Booking => "BOOKING",
            Self::Payment => "PAYMENT",
            Self::Finance => "FINANCE",
            Self::Allotment => "ALLOTMENT",
            Self::Pdi => "PDI",
            Self::Insurance => "INSURANCE",
            Self::Registration => "REGISTRATION",
            Self::Compliance => "COMPLIANCE",
            Self::Delivery => "DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Feedback => "FEEDBACK",
        }
    }

    /// Integer position in the total order.
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Normalizes a free-form status string (trim, uppercase) and looks it up
    /// in the stage table. `None` stands in for the unranked sentinel: such
    /// bookings join no stage bucket and are excluded from rank-threshold
    /// comparisons, but still count toward totals.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::ordered()
            .into_iter()
            .find(|stage| stage.label() == normalized)
    }
}
