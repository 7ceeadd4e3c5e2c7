pub(crate) mod health;
pub(crate) mod logs;
pub(crate) mod run;
pub(crate) mod summarize;
