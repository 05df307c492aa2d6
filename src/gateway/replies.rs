//! Turning a customer message into the bot's reply.

use crate::catalog::{format_product_list, Catalog};
use tokobot_core::traits::Provider;
use tracing::{info, warn};

pub const HELP_TEXT: &str = "Halo! Saya adalah bot toko online.\n\
Anda bisa bertanya tentang produk dengan format: `!produk [nama produk]`\n\
Contoh: `!produk kemeja`\n\
Untuk pertanyaan umum, Anda bisa langsung ketik pertanyaan Anda, saya akan coba jawab dengan AI.";

pub const AI_FAILURE_TEXT: &str =
    "Maaf, ada masalah saat memproses permintaan Anda dengan AI. Silakan coba lagi nanti.";

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// `!produk <query>`
    Products(&'a str),
    /// `!help`
    Help,
    /// Anything else goes to the model.
    Ask(&'a str),
}

pub fn parse(text: &str) -> Command<'_> {
    let text = text.trim();
    if text == "!help" {
        return Command::Help;
    }
    match text.strip_prefix("!produk") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
            Command::Products(rest.trim())
        }
        _ => Command::Ask(text),
    }
}

pub fn shop_prompt(question: &str) -> String {
    format!(
        "Anda adalah asisten AI untuk toko online. Jawab pertanyaan pengguna dengan ramah dan \
         informatif. Jika pertanyaan tidak terkait produk, jawab dengan pengetahuan umum.\n\
         Pengguna: \"{question}\""
    )
}

pub async fn reply_for(text: &str, catalog: &Catalog, provider: &dyn Provider) -> String {
    match parse(text) {
        Command::Help => HELP_TEXT.to_string(),
        Command::Products(query) => {
            let found = catalog.search(query);
            info!("product search '{query}': {} hits", found.len());
            format_product_list(&found)
        }
        Command::Ask(question) => match provider.complete(&shop_prompt(question)).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("{} failed to answer: {e}", provider.name());
                AI_FAILURE_TEXT.to_string()
            }
        },
    }
}
