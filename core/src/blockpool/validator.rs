//! Header and body admission checks for incoming blocks, grounded in
//! `original_source/executor/{block_validator.go,validator_block.go}`.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{tx_root, Block, BlockHeader};

pub trait BlockValidator: Send + Sync {
    fn validate_header(&self, header: &BlockHeader, parent: &BlockHeader, config: &Config) -> Result<()>;
    fn validate_body(&self, block: &Block) -> Result<()>;
}

#[derive(Default)]
pub struct DefaultBlockValidator;

impl BlockValidator for DefaultBlockValidator {
    fn validate_header(&self, header: &BlockHeader, parent: &BlockHeader, config: &Config) -> Result<()> {
        if header.parent_hash != parent.hash() {
            return Err(Error::InvalidHeader("parent_hash does not match parent block".into()));
        }
        if header.height != parent.height + 1 {
            return Err(Error::InvalidHeader("height must be parent height + 1".into()));
        }
        if header.timestamp < parent.timestamp {
            return Err(Error::InvalidHeader("timestamp moves backwards".into()));
        }
        if header.extra.len() > config.max_extra_bytes {
            return Err(Error::InvalidHeader("extra field exceeds maximum size".into()));
        }
        if header.gas_used > header.gas_limit {
            return Err(Error::InvalidHeader("gas_used exceeds gas_limit".into()));
        }
        Ok(())
    }

    fn validate_body(&self, block: &Block) -> Result<()> {
        let expected = tx_root(&block.transactions);
        if expected != block.header.tx_root {
            return Err(Error::InvalidBody("tx_root does not match transactions".into()));
        }
        Ok(())
    }
}
