//! Bank domain used across the suite

use chrono::Utc;
use factlog::{
    Classification, ClassificationRegistry, ClassificationResult, DomainEvent, HandlerRegistry,
    ProjectionState, RegistryError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opened {
    pub owner: String,
}

impl DomainEvent for Opened {
    const EVENT_TYPE: &'static str = "Opened";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoneyDeposited {
    pub amount: i64,
}

impl DomainEvent for MoneyDeposited {
    const EVENT_TYPE: &'static str = "MoneyDeposited";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoneyWithdrawn {
    pub amount: i64,
}

impl DomainEvent for MoneyWithdrawn {
    const EVENT_TYPE: &'static str = "MoneyWithdrawn";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestAccrued {
    pub amount: i64,
}

impl DomainEvent for InterestAccrued {
    const EVENT_TYPE: &'static str = "InterestAccrued";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Closed {}

impl DomainEvent for Closed {
    const EVENT_TYPE: &'static str = "Closed";
}

/// Running balance
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Balance {
    pub owner: Option<String>,
    pub amount: i64,
    pub current_sequence_number: u64,
}

impl ProjectionState for Balance {
    const NAME: &'static str = "Balance";

    fn current_sequence_number(&self) -> u64 {
        self.current_sequence_number
    }

    fn set_current_sequence_number(&mut self, sequence_number: u64) {
        self.current_sequence_number = sequence_number;
    }

    fn register(handlers: &mut HandlerRegistry<Self>) -> Result<(), RegistryError> {
        handlers
            .on::<Opened, _>(|b, e| b.owner = Some(e.owner))?
            .on::<MoneyDeposited, _>(|b, e| b.amount += e.amount)?
            .on::<MoneyWithdrawn, _>(|b, e| b.amount -= e.amount)?
            .on::<InterestAccrued, _>(|b, e| b.amount += e.amount)?;
        Ok(())
    }
}

/// Included when interest accrued on the as-of day (today without a cutoff);
/// excluded once the account is closed
#[derive(Debug, Default)]
pub struct InterestAccruedToday;

impl Classification for InterestAccruedToday {
    const NAME: &'static str = "InterestAccruedToday";

    fn register(handlers: &mut ClassificationRegistry<Self>) -> Result<(), RegistryError> {
        handlers
            .on::<InterestAccrued, _>(|_, _, ctx| {
                let day = ctx.as_of_date.unwrap_or_else(Utc::now).date_naive();
                if ctx.effective_date.date_naive() == day {
                    ClassificationResult::Include
                } else {
                    ClassificationResult::Unchanged
                }
            })?
            .on::<Closed, _>(|_, _, _| ClassificationResult::Exclude)?;
        Ok(())
    }
}

/// Included when a single deposit reached `threshold`
#[derive(Debug)]
pub struct LargeDeposit {
    pub threshold: i64,
}

impl Classification for LargeDeposit {
    const NAME: &'static str = "LargeDeposit";

    fn register(handlers: &mut ClassificationRegistry<Self>) -> Result<(), RegistryError> {
        handlers.on::<MoneyDeposited, _>(|rule, e, _| {
            if e.amount >= rule.threshold {
                ClassificationResult::Include
            } else {
                ClassificationResult::Unchanged
            }
        })?;
        Ok(())
    }
}
