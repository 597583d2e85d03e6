use super::{print_json, EngineArgs};
use clap::Args;
use std::collections::HashMap;
use tracing::info;

#[derive(Args)]
pub struct QueryCommand {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Query template, parameters referenced as {{.name}}
    pub query: String,

    /// Template parameter as key=value (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;

    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

impl QueryCommand {
    pub fn execute(self, real_time: bool) -> anyhow::Result<()> {
        let QueryCommand {
            engine,
            query,
            params,
        } = self;
        let params: HashMap<String, String> = params.into_iter().collect();

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let service = engine.service().await?;
            let ctx = engine.context();

            info!(
                "Running query for merchant {} (trace {})",
                ctx.merchant_id, ctx.trace_id
            );
            let result = if real_time {
                service.query_real_time(&ctx, &query, &params).await
            } else {
                service.query(&ctx, &query, &params).await
            };

            service.registry().close_all().await;
            print_json(&result?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("zamp_table_name_1=ds1").unwrap(),
            ("zamp_table_name_1".to_string(), "ds1".to_string())
        );
        assert_eq!(
            parse_param("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }
}
