use anyhow::Context;
use msgbuf::prelude::*;
use msgbuf::{AdapterFamily, CapabilityTable, ConsoleBot, MsgBufConfig};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    msgbuf::log::init();

    let config = MsgBufConfig::load("msgbuf.toml")
        .await
        .context("加载 msgbuf.toml 失败")?;
    if CapabilityTable::install(config.build_table()?).is_err() {
        error!("能力表已安装，忽略配置");
    }

    for family in [
        AdapterFamily::OneBotV11,
        AdapterFamily::Telegram,
        AdapterFamily::PlainText,
    ] {
        info!("演示适配器: {}", family);
        let session = Session::new(Arc::new(ConsoleBot::new(family)), Destination::group(10001))
            .with_specs(config.specs()?);
        let buf = config.msgbuf()?;

        session
            .scope(buf.run(|buf| {
                Box::pin(async move {
                    buf.reply(42)?
                        .mention(10002)?
                        .text(" 今天的天气：")?
                        .image("https://example.com/weather.png")?
                        .text("晴")?
                        .share("https://example.com/forecast", "一周预报")?
                        .location(39.9, 116.4)?;
                    Ok::<_, MsgBufError>(())
                })
            }))
            .await?;
    }
    Ok(())
}
