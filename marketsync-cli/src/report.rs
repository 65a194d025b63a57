//! End-of-run summary

use colored::*;
use log::error;
use std::collections::BTreeSet;

use crate::api::OperationResult;

/// What one job did
#[derive(Debug, Default)]
pub struct SyncReport {
    pub job: String,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    /// `<operation> <entity>: <message>` for every failed write
    pub failures: Vec<String>,
    /// Identifiers that could not be resolved on the ERP side
    pub not_found: BTreeSet<String>,
}

impl SyncReport {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            ..Default::default()
        }
    }

    /// Count a write result
    pub fn record(&mut self, result: &OperationResult) {
        let op = &result.operation;
        if result.is_success() {
            match op.operation_type() {
                "update" => self.updated += 1,
                _ => self.created += 1,
            }
            return;
        }

        let message = result.error.as_deref().unwrap_or("unknown error");
        error!("{} {} failed: {}", op.operation_type(), op.entity(), message);
        self.failures
            .push(format!("{} {}: {}", op.operation_type(), op.entity(), message));
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.failures.push(message);
    }

    pub fn not_found(&mut self, id: impl Into<String>) {
        self.not_found.insert(id.into());
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.not_found.is_empty()
    }

    pub fn print_summary(&self) {
        println!();
        println!("{} {}", "Sync finished:".bold(), self.job.cyan());
        println!("  created: {}", self.created.to_string().green());
        println!("  updated: {}", self.updated.to_string().green());
        println!("  skipped: {}", self.skipped.to_string().yellow());

        if !self.failures.is_empty() {
            println!("  failed:  {}", self.failures.len().to_string().red());
            for failure in &self.failures {
                println!("    {}", failure.dimmed());
            }
        }

        if !self.not_found.is_empty() {
            println!("{}", "Not found in MS:".yellow().bold());
            for id in &self.not_found {
                println!("  {}", id);
            }
        }
    }
}
