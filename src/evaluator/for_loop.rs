//! `/for` (spec §4.5, §5 concurrency model): iterates a collection,
//! binding `value_name` (and `key_name` for objects) per iteration.
//! `parallel N` batches iterations N at a time; results are always
//! merged back in input order regardless of batch completion order.

use crate::ast::ForNode;
use crate::context::{ContextManager, ForFrame};
use crate::env::Environment;
use crate::errors::MlldResult;
use crate::hooks::HookTiming;
use crate::value::{Value, ValueData, Variable};

use super::Evaluator;

enum Entry {
    Indexed(usize, Value),
    Keyed(String, Value),
}

fn collection_entries(collection: &Value) -> Vec<Entry> {
    match &collection.data {
        ValueData::Array(items) => items.iter().cloned().enumerate().map(|(i, v)| Entry::Indexed(i, v)).collect(),
        ValueData::Object(map) => map.iter().map(|(k, v)| Entry::Keyed(k.clone(), v.clone())).collect(),
        other => vec![Entry::Indexed(0, Value::with_security(other.clone(), collection.security.clone()))],
    }
}

pub async fn eval_for(ev: &Evaluator, node: &ForNode, env: &Environment, ctx: &mut ContextManager) -> MlldResult<Value> {
    let collection = ev.eval(&node.collection, env, ctx).await?;
    let entries = collection_entries(&collection);
    let total = entries.len();
    let batch_size = node.parallel.map(|n| n.max(1) as usize).unwrap_or(1);

    // Snapshot before any batch hook fires: a hook body can itself
    // evaluate directives that re-enter this loop, and the registry's
    // mutex isn't reentrant.
    let hooks = ev.hooks.lock().await.clone();

    let mut results = Vec::with_capacity(total);
    let mut next_keyed_index = 0usize;
    for (batch_index, batch) in entries.chunks(batch_size).enumerate() {
        let this_batch_size = batch.len();
        hooks
            .dispatch(HookTiming::Before, "for:batch", None, None, None, env, ctx, ev)
            .await;

        // Within a batch, items run concurrently (spec §5): each gets its
        // own `Environment` child and its own `ContextManager` clone (the
        // registry mutexes and `ctx` itself aren't meant to be shared
        // across tasks polled at the same time), joined with
        // `futures::future::join_all` rather than awaited one at a time.
        // Batches themselves stay sequential.
        let mut futures = Vec::with_capacity(batch.len());
        for entry in batch {
            let (index, key, value) = match entry {
                Entry::Indexed(i, v) => (*i, None, v.clone()),
                Entry::Keyed(k, v) => {
                    let i = next_keyed_index;
                    next_keyed_index += 1;
                    (i, Some(Value::text(k.clone())), v.clone())
                }
            };

            let body_env = env.child();
            let mut item_ctx = ctx.clone();
            let hooks = hooks.clone();
            futures.push(async move {
                body_env.define(Variable::simple(node.value_name.clone(), value.clone())).await;
                if let Some(key_name) = &node.key_name {
                    if let Some(key_value) = &key {
                        body_env.define(Variable::simple(key_name.clone(), key_value.clone())).await;
                    }
                }

                item_ctx.push_for(ForFrame {
                    index,
                    key: key.clone(),
                    value: value.clone(),
                    total,
                    batch_index,
                    batch_size: this_batch_size,
                });
                hooks
                    .dispatch(HookTiming::Before, "for:iteration", None, None, None, &body_env, &mut item_ctx, ev)
                    .await;
                let outcome = ev.eval(&node.body, &body_env, &mut item_ctx).await;
                hooks
                    .dispatch(HookTiming::After, "for:iteration", None, None, None, &body_env, &mut item_ctx, ev)
                    .await;
                item_ctx.pop_for();

                (index, outcome, item_ctx)
            });
        }

        // Each item_ctx started as a fresh clone of `ctx`, so every hook
        // error recorded on it during the batch is new.
        let batch_results = futures::future::join_all(futures).await;
        for (index, outcome, item_ctx) in batch_results {
            for message in item_ctx.hook_errors() {
                ctx.record_hook_error(message.clone());
            }
            results.push((index, outcome?));
        }

        hooks
            .dispatch(HookTiming::After, "for:batch", None, None, None, env, ctx, ev)
            .await;
    }

    results.sort_by_key(|(index, _)| *index);
    Ok(Value::new(ValueData::Array(results.into_iter().map(|(_, v)| v).collect())))
}
