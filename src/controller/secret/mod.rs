//! # Secrets
//!
//! Building, copying and combining the Secrets the controller writes.

mod copier;
mod dockerconfig;

pub use copier::{
    apply_secret_content, associate_existing_secret, create_or_update, delete_secret,
    secret_content_equal, CopyError, DerivedSecret, SecretValues, SecretWrite,
};
pub use dockerconfig::{combine_docker_configs, CombineError};
