//! Demo responder served by the `http-dispatcher` binary.

use axum::http::StatusCode;

use crate::binding::Arguments;
use crate::http::HttpContext;
use crate::routing::{Endpoint, HandlerResult, Param, Responder};

/// Greets and adds numbers.
#[derive(Debug, Default)]
pub struct DemoResponder;

impl DemoResponder {
    fn hello_world(&self, ctx: &mut HttpContext, _args: &Arguments) -> HandlerResult {
        ctx.text(StatusCode::OK, "Hello, world!")?;
        Ok(())
    }

    fn sum(&self, ctx: &mut HttpContext, args: &Arguments) -> HandlerResult {
        let left: i64 = args.get("left")?;
        let right: i64 = args.get("right")?;
        let sum = left
            .checked_add(right)
            .ok_or_else(|| crate::dispatch::HandlerError::msg("sum overflows a 64-bit integer"))?;
        ctx.text(StatusCode::OK, &sum.to_string())?;
        Ok(())
    }
}

impl Responder<HttpContext> for DemoResponder {
    fn name(&self) -> &str {
        "demo"
    }

    fn endpoints(&self) -> Vec<Endpoint<Self, HttpContext>> {
        vec![
            Endpoint::new("/hello-world", Self::hello_world).named("hello_world"),
            Endpoint::get("/sum/{left}/{right}", Self::sum)
                .named("sum")
                .param(Param::long("left"))
                .param(Param::long("right")),
        ]
    }
}
