//! Literal-input scenario tests (S1-S6).

use std::sync::Arc;

use ed25519_dalek::Keypair;
use obscura_core::bmt::{Tree, WriteSet};
use obscura_core::blockpool::{BlockPool, DefaultBlockValidator};
use obscura_core::config::Config;
use obscura_core::kv::MemKvStore;
use obscura_core::state::StateDB;
use obscura_core::txpool::{DefaultTxValidator, TxPool};
use obscura_core::types::{Block, BlockHeader, Transaction, TxData};
use obscura_core::{address_from_pubkey, Address, Amount, Error, Hash};
use rand_core::OsRng;

fn six_key_writes() -> WriteSet {
    let mut ws = WriteSet::new();
    ws.put("test1", "asdffsdf");
    ws.put("abcd", "test2asd");
    ws.put("lslsl", "test3f");
    ws.put("werw", "test12as");
    ws.put("ffff", "FDas");
    ws.put("asdf", "asdfff");
    ws
}

/// S1: six-key put against an empty tree commits to a non-zero root, and
/// repeating the identical writes against a fresh tree yields the same root.
#[test]
fn s1_bmt_six_key_put() {
    let mut t1 = Tree::open(Arc::new(MemKvStore::new()), 4, 2, Hash::ZERO).unwrap();
    t1.process(&six_key_writes()).unwrap();
    let root1 = t1.commit().unwrap();
    assert_ne!(root1, Hash::ZERO);

    let mut t2 = Tree::open(Arc::new(MemKvStore::new()), 4, 2, Hash::ZERO).unwrap();
    t2.process(&six_key_writes()).unwrap();
    let root2 = t2.commit().unwrap();
    assert_eq!(root1, root2);
}

/// S2: a further write changes the root.
#[test]
fn s2_bmt_update_root_changes() {
    let mut tree = Tree::open(Arc::new(MemKvStore::new()), 4, 2, Hash::ZERO).unwrap();
    tree.process(&six_key_writes()).unwrap();
    let root_s1 = tree.commit().unwrap();

    let mut ws = WriteSet::new();
    ws.put("lowesyang", "lowesyang");
    tree.process(&ws).unwrap();
    let root_s2 = tree.commit().unwrap();

    assert_ne!(root_s1, root_s2);
}

/// S3: reopening a committed tree at its root reproduces the same shape and
/// root; the original readable entries are still present.
#[test]
fn s3_bmt_reopen() {
    let kv = Arc::new(MemKvStore::new());
    let mut tree = Tree::open(kv.clone(), 4, 2, Hash::ZERO).unwrap();
    tree.process(&six_key_writes()).unwrap();
    let mut ws = WriteSet::new();
    ws.put("lowesyang", "lowesyang");
    tree.process(&ws).unwrap();
    let root = tree.commit().unwrap();

    let reopened = Tree::open(kv, 4, 2, root).unwrap();
    assert_eq!(reopened.root(), root);
    assert_eq!(reopened.capacity(), tree.capacity());
    assert_eq!(reopened.get(b"test1").unwrap(), Some(b"asdffsdf".to_vec()));
    assert_eq!(reopened.get(b"lowesyang").unwrap(), Some(b"lowesyang".to_vec()));
}

fn signed_tx(key: &Keypair, nonce: u64) -> Transaction {
    let from = address_from_pubkey(&key.public);
    let mut tx = Transaction::new_unsigned(TxData {
        nonce,
        gas_limit: 21_000,
        value: Amount::from_u64(1),
        from,
        to: Some(Address::from_slice(&[9; 20])),
        payload: Vec::new(),
    });
    let signature = key.sign(tx.hash().as_bytes());
    tx.attach_signature(signature, key.public);
    tx
}

/// S4: submitting nonces out of order (2, 3, 0, 1) still converges to a
/// fully-promoted, gap-free pending list once the gap fills.
#[tokio::test]
async fn s4_nonce_gap() {
    let mut csprng = OsRng {};
    let key = Keypair::generate(&mut csprng);
    let from = address_from_pubkey(&key.public);

    let state = Arc::new(StateDB::open(Arc::new(MemKvStore::new()), &Config::default(), Hash::ZERO).unwrap());
    state.set_balance(from, Amount::from_u64(1_000_000)).unwrap();

    let (pool, _batcher) = TxPool::new(Config::default(), state, Arc::new(DefaultTxValidator));
    for nonce in [2, 3, 0, 1] {
        pool.add(signed_tx(&key, nonce)).await.unwrap();
    }

    let pending = pool.pending_txs(from);
    let nonces: Vec<u64> = pending.iter().map(|tx| tx.nonce()).collect();
    assert_eq!(nonces, vec![0, 1, 2, 3]);
    assert!(pool.queued_txs(from).is_empty());
    assert_eq!(pool.len(), 4);
}

/// S5: a replacement at the same nonce is rejected just below the bump
/// threshold and accepted just at it, with the pool size unchanged either
/// way.
#[tokio::test]
async fn s5_replacement_boundary() {
    let mut csprng = OsRng {};
    let key = Keypair::generate(&mut csprng);
    let from = address_from_pubkey(&key.public);

    let state = Arc::new(StateDB::open(Arc::new(MemKvStore::new()), &Config::default(), Hash::ZERO).unwrap());
    state.set_balance(from, Amount::from_u64(1_000_000)).unwrap();
    let config = Config { price_bump: 20, ..Config::default() };
    let (pool, _batcher) = TxPool::new(config, state, Arc::new(DefaultTxValidator));

    let mut first = Transaction::new_unsigned(TxData {
        nonce: 5,
        gas_limit: 100,
        value: Amount::from_u64(0),
        from,
        to: Some(Address::from_slice(&[9; 20])),
        payload: Vec::new(),
    });
    let sig = key.sign(first.hash().as_bytes());
    first.attach_signature(sig, key.public);
    pool.add(first).await.unwrap();
    assert_eq!(pool.len(), 1);

    let build = |gas_limit: u64| {
        let mut tx = Transaction::new_unsigned(TxData {
            nonce: 5,
            gas_limit,
            value: Amount::from_u64(0),
            from,
            to: Some(Address::from_slice(&[9; 20])),
            payload: Vec::new(),
        });
        let sig = key.sign(tx.hash().as_bytes());
        tx.attach_signature(sig, key.public);
        tx
    };

    let err = pool.add(build(119)).await.unwrap_err();
    assert!(matches!(err, Error::TxDiscard));
    assert_eq!(pool.len(), 1);

    pool.add(build(120)).await.unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.pending_txs(from)[0].gas_limit(), 120);
}

fn genesis_header() -> BlockHeader {
    BlockHeader {
        parent_hash: Hash::ZERO,
        height: 9,
        timestamp: 0,
        coinbase: Address::ZERO,
        state_root: Hash::ZERO,
        tx_root: obscura_core::types::tx_root(&[]),
        receipts_hash: Hash::ZERO,
        gas_limit: 8_000_000,
        gas_used: 0,
        extra: Vec::new(),
    }
}

/// S6: the second block submitted at an already-admitted height is rejected
/// as a duplicate; the pool keeps the first.
#[tokio::test]
async fn s6_block_duplicate() {
    let (pool, _batcher) = BlockPool::new(Config::default(), Arc::new(DefaultBlockValidator));
    let parent = genesis_header();

    let mut first_header = BlockHeader { height: 10, timestamp: 1, ..genesis_header() };
    first_header.parent_hash = parent.hash();
    let first = Block::new(first_header, Vec::new());
    let first_hash = first.hash();
    pool.add(first, &parent).await.unwrap();

    let mut second_header = BlockHeader { height: 10, timestamp: 2, ..genesis_header() };
    second_header.parent_hash = parent.hash();
    let second = Block::new(second_header, Vec::new());
    let err = pool.add(second, &parent).await.unwrap_err();
    assert!(matches!(err, Error::BlockDuplicate));

    assert_eq!(pool.get(10).unwrap().hash(), first_hash);
}
