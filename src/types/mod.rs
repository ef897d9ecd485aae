pub mod account;
pub mod result;
pub mod test;

pub use account::{IntervalStep, MailboxAccount, ProviderProfile};
pub use result::{AuthResults, DkimResult, DmarcResult, Placement, SpfResult, TestResult};
pub use test::{Association, DeliveryTest, TestRequest, TestStatus};
