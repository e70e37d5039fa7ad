//! DriveShaft headless demo
//!
//! Loads a start page, then follows each given link through DriveShaft the
//! way a user click would, printing what every navigation did.
//!
//! Usage: `driveshaft <start-url> [link-href ...]`

use anyhow::{bail, Context};
use driveshaft::dom::{Document, NodeId};
use driveshaft::net::{fetch, AbortSignal, Request, ReqwestClient};
use driveshaft::request::ACCEPT_HTML;
use driveshaft::{BrowserHost, Config, DriveShaft, NavigateEvent};
use smol::LocalExecutor;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Host without a screen: native actions are only logged
struct HeadlessHost;

impl BrowserHost for HeadlessHost {
    fn push_history(&self, url: &Url) {
        tracing::info!(%url, "history push");
    }

    fn click(&self, anchor: NodeId) {
        tracing::warn!(?anchor, "native click requested");
    }

    fn submit(&self, form: NodeId, submitter: Option<NodeId>) {
        tracing::warn!(?form, ?submitter, "native submit requested");
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(start) = args.next() else {
        bail!("usage: driveshaft <start-url> [link-href ...]");
    };
    let start = Url::parse(&start).with_context(|| format!("invalid start url {start}"))?;
    let links: Vec<String> = args.collect();

    let executor = LocalExecutor::new();
    smol::block_on(executor.run(run(start, links)))
}

async fn load(client: &ReqwestClient, url: Url) -> anyhow::Result<Document> {
    let request = Request::get(url.clone()).with_header("Accept", ACCEPT_HTML);
    let mut response = fetch(client, request, &AbortSignal::never())
        .await
        .with_context(|| format!("failed to load {url}"))?;
    let html = response.text().await?;
    Ok(driveshaft::html::parse_document(&html, &response.url)?)
}

fn find_anchor(doc: &Document, href: &str) -> Option<NodeId> {
    let target = doc.resolve_url(href)?;
    doc.tree.descendants(NodeId::ROOT).find(|&node| {
        doc.tree.is_tag(node, "a")
            && doc
                .tree
                .get_attribute(node, "href")
                .and_then(|h| doc.resolve_url(h))
                .is_some_and(|u| u == target)
    })
}

async fn run(start: Url, links: Vec<String>) -> anyhow::Result<()> {
    let client = ReqwestClient::new()?;
    let document = load(&client, start).await?;
    println!("loaded {} ({})", document.url(), document.title());

    let driveshaft = DriveShaft::new(document, HeadlessHost, client, &Config::default())?;
    driveshaft.start();

    for href in links {
        let event = {
            let document = driveshaft.document();
            let doc = document.borrow();
            let Some(anchor) = find_anchor(&doc, &href) else {
                println!("{href}: no matching link on {}", doc.url());
                continue;
            };
            let Some(destination) = doc.resolve_url(&href) else {
                continue;
            };
            NavigateEvent::click(destination, anchor)
        };

        match driveshaft.handle_navigate(event) {
            Some(interception) => {
                let outcome = interception.handler.await;
                let document = driveshaft.document();
                let doc = document.borrow();
                println!("{href}: {outcome} -> {} ({})", doc.url(), doc.title());
            }
            None => println!("{href}: not intercepted"),
        }
    }

    driveshaft.stop();
    Ok(())
}
