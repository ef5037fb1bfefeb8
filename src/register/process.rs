use super::{merge_field, same_key, RegisterTab};
use crate::core::error::{RegisterError, Result};
use crate::core::validate::require_non_empty;
use crate::entities::process::{
    dependents, process_flow, FlowEdge, NewProcess, ProcessInteraction, ProcessStats,
    ProcessUpdate,
};
use crate::sheets::SheetStore;

/// The process interaction sheet
#[derive(Debug)]
pub struct ProcessRegister<S> {
    tab: RegisterTab<S>,
}

impl<S: SheetStore> ProcessRegister<S> {
    pub fn new(store: S, tab: impl Into<String>) -> Self {
        Self {
            tab: RegisterTab::new(store, tab),
        }
    }

    pub fn into_store(self) -> S {
        self.tab.into_store()
    }

    pub fn list(&mut self) -> Result<Vec<ProcessInteraction>> {
        self.tab.records()
    }

    pub fn get(&mut self, name: &str) -> Result<ProcessInteraction> {
        Ok(self.tab.locate::<ProcessInteraction>(name)?.record)
    }

    /// Append a process; names are unique regardless of case
    pub fn add(&mut self, input: NewProcess) -> Result<ProcessInteraction> {
        require_non_empty("process name", &input.name)?;
        require_non_empty("owner", &input.owner)?;
        require_non_empty("outputs", &input.outputs)?;
        require_non_empty("receiver", &input.receiver)?;
        require_non_empty("KPI", &input.kpi)?;

        let name = input.name.trim().to_string();
        let duplicate = self
            .list()?
            .into_iter()
            .any(|p| same_key(&p.name, &name));
        if duplicate {
            return Err(RegisterError::DuplicateKey {
                entity: "Process",
                key: name,
            });
        }

        let process = ProcessInteraction {
            name,
            owner: input.owner,
            inputs: input.inputs,
            activities: input.activities,
            outputs: input.outputs,
            receiver: input.receiver,
            kpi: input.kpi,
        };
        self.tab.append(&process)?;
        Ok(process)
    }

    /// Merge `update` into the named process and overwrite its row
    pub fn update(&mut self, name: &str, update: ProcessUpdate) -> Result<ProcessInteraction> {
        let located = self.tab.locate::<ProcessInteraction>(name)?;

        let mut merged = located.record;
        merge_field(&mut merged.owner, update.owner);
        merge_field(&mut merged.inputs, update.inputs);
        merge_field(&mut merged.activities, update.activities);
        merge_field(&mut merged.outputs, update.outputs);
        merge_field(&mut merged.receiver, update.receiver);
        merge_field(&mut merged.kpi, update.kpi);

        require_non_empty("owner", &merged.owner)?;
        require_non_empty("receiver", &merged.receiver)?;
        require_non_empty("KPI", &merged.kpi)?;

        self.tab.overwrite(located.row, &merged)?;
        Ok(merged)
    }

    pub fn stats(&mut self) -> Result<ProcessStats> {
        Ok(ProcessStats::compute(&self.list()?))
    }

    pub fn flow(&mut self) -> Result<Vec<FlowEdge>> {
        Ok(process_flow(&self.list()?))
    }

    /// Processes consuming the output of `name`
    pub fn dependents(&mut self, name: &str) -> Result<Vec<ProcessInteraction>> {
        let processes = self.list()?;
        Ok(dependents(&processes, name).into_iter().cloned().collect())
    }
}
