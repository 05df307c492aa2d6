//! Product catalog loaded from a JSON array file.

use serde::Deserialize;
use std::path::Path;
use tokobot_core::error::TokoError;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Product {
    pub name: String,
    /// Whole rupiah.
    pub price: u64,
    pub stock: u32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn load(path: &Path) -> Result<Self, TokoError> {
        let raw = std::fs::read_to_string(path)?;
        let products: Vec<Product> = serde_json::from_str(&raw)?;
        Ok(Self { products })
    }

    /// Load `path`, falling back to an empty catalog when it cannot be read.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(catalog) => {
                info!("loaded {} products from {}", catalog.len(), path.display());
                catalog
            }
            Err(e) => {
                error!("failed to load products from {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Case-insensitive substring match on name or description.
    pub fn search(&self, query: &str) -> Vec<&Product> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.products
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&query)
                    || p.description.to_lowercase().contains(&query)
            })
            .collect()
    }
}

/// `1250000` -> `1.250.000`
pub fn format_rupiah(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

pub fn format_product_list(products: &[&Product]) -> String {
    if products.is_empty() {
        return "Maaf, produk yang Anda cari tidak ditemukan.".to_string();
    }

    let mut out = String::from("Berikut adalah produk yang kami temukan:\n\n");
    for p in products {
        out.push_str(&format!(
            "*{}*\nHarga: Rp {}\nStok: {}\nDeskripsi: {}\n\n",
            p.name,
            format_rupiah(p.price),
            p.stock,
            p.description
        ));
    }
    out.push_str("Apakah ada yang ingin Anda tanyakan lagi?");
    out
}
