// tests/context_tests.rs
mod common;

use common::*;
use stagehand::ContextData;

#[test]
fn clones_share_the_same_data() {
  let a = ContextData::new(SignOffCtx::default());
  let b = a.clone();
  a.write().signed.push("ceo".to_string());
  assert_eq!(b.read().signed, vec!["ceo"]);
  assert_eq!(*b.map_read(|c| &c.signed[0]), "ceo");
}

#[test]
fn into_inner_requires_the_last_handle() {
  let a = ContextData::new(SignOffCtx {
    reserved_amount: 9,
    ..Default::default()
  });
  let b = a.clone();
  let a = a.into_inner().unwrap_err();
  drop(b);
  let inner = a.into_inner().unwrap();
  assert_eq!(inner.reserved_amount, 9);
}
