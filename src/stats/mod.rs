//! Statistics: correlation with significance and the distribution tails behind it

pub mod correlation;
pub mod distribution;

pub use correlation::{pearson_test, CorrelationMatrix, FeatureCorrelation};
pub use distribution::{
    binomial_upper_tail, clopper_pearson, incomplete_beta, ln_gamma, student_t_two_sided,
};
