//! Response enrichment: filter evaluation, option lists, parent summaries, post-save redirects.

mod choices;
mod filter;
mod parent;
mod redirect;

pub use choices::{Choice, ChoiceEnricher};
pub use filter::{foreign_key_lookups, FilterEvaluator};
pub use parent::ParentEnricher;
pub use redirect::{plan_redirect, split_directive, Redirect};
