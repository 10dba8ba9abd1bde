use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid {param} value: {value} is not an integer")]
    InvalidInteger { param: &'static str, value: String },

    #[error("Invalid {param} value: {value} is not a valid id")]
    InvalidUuid { param: &'static str, value: String },

    #[error("Invalid {param} value: {value}. Expected one of: {expected}")]
    InvalidEnum {
        param: &'static str,
        value: String,
        expected: String,
    },

    #[error("Invalid {param} value: {value} is not a YYYY-MM-DD date")]
    InvalidDate { param: &'static str, value: String },

    #[error("Invalid sort_by: {value}. Expected one of: {expected}")]
    InvalidSort { value: String, expected: String },
}
