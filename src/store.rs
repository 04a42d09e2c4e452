//! Persistent store adapter.
//!
//! The whole invoice collection lives in one JSON array under the data
//! root and is rewritten as a unit on every mutation. There is no lock:
//! two processes sharing the same data root race and the last writer
//! wins.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::Invoice;

pub const INVOICES_FILE: &str = "invoices.json";

pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn open(root: impl Into<PathBuf>) -> Result<Store> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| Error::Storage(format!("cannot create {}: {}", root.display(), e)))?;
        Ok(Store { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn invoices_path(&self) -> PathBuf {
        self.root.join(INVOICES_FILE)
    }

    /// The full collection; an absent file is an empty collection, not an
    /// error.
    pub fn load(&self) -> Result<Vec<Invoice>> {
        let path = self.invoices_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        let invoices = serde_json::from_str(&content)?;
        Ok(invoices)
    }

    /// Rewrites the whole collection in one write.
    pub fn save(&self, invoices: &[Invoice]) -> Result<()> {
        let content = serde_json::to_string_pretty(invoices)?;
        fs::write(self.invoices_path(), content)?;
        Ok(())
    }

    pub fn find(&self, invoice_number: &str) -> Result<Option<Invoice>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|invoice| invoice.invoice_number == invoice_number))
    }

    /// Replace the record matching `invoice_number` in place, or prepend
    /// when the number is new.
    pub fn upsert(&self, invoice: Invoice) -> Result<()> {
        let mut invoices = self.load()?;
        match invoices
            .iter()
            .position(|existing| existing.invoice_number == invoice.invoice_number)
        {
            Some(index) => invoices[index] = invoice,
            None => invoices.insert(0, invoice),
        }
        self.save(&invoices)
    }

    /// Remove by invoice number. Returns whether anything was removed; an
    /// unknown number leaves the collection unchanged.
    pub fn delete(&self, invoice_number: &str) -> Result<bool> {
        let mut invoices = self.load()?;
        let before = invoices.len();
        invoices.retain(|invoice| invoice.invoice_number != invoice_number);
        if invoices.len() == before {
            return Ok(false);
        }
        self.save(&invoices)?;
        Ok(true)
    }

    /// Import commit: appends the whole batch in a single write. Nothing
    /// is persisted if the load or the write fails.
    pub fn append_all(&self, batch: Vec<Invoice>) -> Result<usize> {
        let count = batch.len();
        let mut invoices = self.load()?;
        invoices.extend(batch);
        self.save(&invoices)?;
        Ok(count)
    }
}
