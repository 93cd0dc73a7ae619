//! Deferred operands, rejections and skipping

use proving_ground::ledger::{Ledger, Operand};
use proving_ground::models::{Module, Outcome, StepResult};
use std::time::Duration;

async fn fetch_answer() -> anyhow::Result<u32> {
    tokio::time::sleep(Duration::from_millis(10)).await;
    Ok(42)
}

async fn fetch_missing() -> anyhow::Result<u32> {
    tokio::time::sleep(Duration::from_millis(10)).await;
    anyhow::bail!("record 7 not found")
}

fn eventual_values(t: Ledger) -> StepResult {
    t.eventually(Operand::pending(fetch_answer()), Operand::ready(42u32))
        .equal();
    t.ok_eventually(Operand::resolved(async { true }));
    Ok(Outcome::resolved())
}

fn rejections(t: Ledger) -> StepResult {
    t.rejects(fetch_missing());

    let inner = t.clone();
    t.rejects_with(fetch_missing(), move |error| {
        inner.ok(error.to_string().contains("not found"));
        Ok(())
    });
    Ok(Outcome::resolved())
}

fn awaited_body(t: Ledger) -> StepResult {
    Ok(Outcome::future(async move {
        let answer = fetch_answer().await?;
        t.equal(answer, 42u32);
        Ok(())
    }))
}

fn not_ready_yet(t: Ledger) -> StepResult {
    t.skip();
    Ok(Outcome::Pending)
}

pub fn module() -> Module {
    Module::new()
        .test("eventual values", eventual_values)
        .test("rejections", rejections)
        .test("awaited body", awaited_body)
        .test("not ready yet", not_ready_yet)
}
