// Date source for the "check-in must not be in the past" rule

use chrono::{Local, NaiveDate};

pub trait Clock: Send + Sync + 'static {
    fn today(&self) -> NaiveDate;
}

// Local calendar date of the machine running the flow
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
