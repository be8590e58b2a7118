//! The naming pass: counts labels of each kind, then assigns
//! digit-padded identifiers. User-provided names are never touched.

use std::collections::BTreeMap;

use crate::labels::LabelKind;
use crate::memory::MemAttr;

use super::Disassembler;

/// Configurable label-name prefixes.
#[derive(Debug, Clone)]
pub struct NamingOptions {
    pub sub_prefix: String,
    pub lbl_prefix: String,
    pub rst_prefix: String,
    pub data_lbl_prefix: String,
    pub self_modifying_prefix: String,
    /// Suffix for local labels, appended to the lowercased parent name.
    pub local_label_prefix: String,
    /// Suffix for local loop labels.
    pub loop_prefix: String,
    pub intrpt_prefix: String,
}

impl Default for NamingOptions {
    fn default() -> Self {
        NamingOptions {
            sub_prefix: "SUB".to_string(),
            lbl_prefix: "LBL".to_string(),
            rst_prefix: "RST".to_string(),
            data_lbl_prefix: "DATA".to_string(),
            self_modifying_prefix: "SELF_MOD".to_string(),
            local_label_prefix: "_l".to_string(),
            loop_prefix: "_loop".to_string(),
            intrpt_prefix: "INTRPT".to_string(),
        }
    }
}

fn index_width(total: usize) -> usize {
    total.max(1).to_string().len()
}

impl Disassembler {
    /// Pass 11: two-pass naming. First count the unnamed labels in each
    /// bucket so indices can be zero-padded to the bucket's digit
    /// width, then assign names in ascending address order. Local
    /// labels are named after their (already named) parents.
    pub(crate) fn assign_label_names(&mut self) {
        let mut interrupts = Vec::new();
        let mut subs = Vec::new();
        let mut lbls = Vec::new();
        let mut rsts = Vec::new();
        let mut datas = Vec::new();
        let mut self_mods = Vec::new();
        let mut locals = Vec::new();

        for (&addr, label) in self.labels.iter() {
            if label.name.is_some() {
                continue;
            }
            if label.belongs_to_interrupt {
                interrupts.push(addr);
                continue;
            }
            match label.kind {
                LabelKind::CodeSub => subs.push(addr),
                LabelKind::CodeLbl => lbls.push(addr),
                LabelKind::CodeRst => rsts.push(addr),
                LabelKind::DataLbl => {
                    if self.memory.attr(addr).contains(MemAttr::CODE) {
                        self_mods.push(addr);
                    } else {
                        datas.push(addr);
                    }
                }
                LabelKind::CodeLocalLbl | LabelKind::CodeLocalLoop => locals.push(addr),
                _ => {}
            }
        }

        let naming = self.naming.clone();
        self.name_bucket(&subs, &naming.sub_prefix);
        self.name_bucket(&lbls, &naming.lbl_prefix);
        self.name_bucket(&datas, &naming.data_lbl_prefix);
        self.name_bucket(&self_mods, &naming.self_modifying_prefix);

        // RST labels carry their page-zero address in decimal.
        for addr in rsts {
            if let Some(label) = self.labels.get_mut(addr) {
                label.name = Some(format!("{}{:02}", naming.rst_prefix, addr));
            }
        }

        // Interrupts are numbered only when there is more than one.
        if interrupts.len() == 1 {
            if let Some(label) = self.labels.get_mut(interrupts[0]) {
                label.name = Some(naming.intrpt_prefix.clone());
            }
        } else {
            let width = index_width(interrupts.len());
            for (i, addr) in interrupts.into_iter().enumerate() {
                if let Some(label) = self.labels.get_mut(addr) {
                    label.name = Some(format!("{}{:0width$}", naming.intrpt_prefix, i + 1));
                }
            }
        }

        self.name_locals(&locals, &naming);
    }

    fn name_bucket(&mut self, addrs: &[u16], prefix: &str) {
        let width = index_width(addrs.len());
        for (i, &addr) in addrs.iter().enumerate() {
            if let Some(label) = self.labels.get_mut(addr) {
                label.name = Some(format!("{prefix}{:0width$}", i + 1));
            }
        }
    }

    /// Locals become `.<parent>_l` / `.<parent>_loop`, with a trailing
    /// index when the parent has more than one child of that kind.
    fn name_locals(&mut self, locals: &[u16], naming: &NamingOptions) {
        let mut groups: BTreeMap<(Option<u16>, bool), Vec<u16>> = BTreeMap::new();
        for &addr in locals {
            let is_loop = matches!(
                self.labels.get(addr).map(|l| l.kind),
                Some(LabelKind::CodeLocalLoop)
            );
            let parent = self.parents[addr as usize];
            groups.entry((parent, is_loop)).or_default().push(addr);
        }

        for ((parent, is_loop), members) in groups {
            let parent_name = parent
                .and_then(|p| self.labels.get(p))
                .and_then(|l| l.name.clone())
                .unwrap_or_else(|| format!("L{:04X}", parent.unwrap_or(0)))
                .to_lowercase();
            let suffix = if is_loop {
                &naming.loop_prefix
            } else {
                &naming.local_label_prefix
            };
            let single = members.len() == 1;
            for (i, addr) in members.into_iter().enumerate() {
                let name = if single {
                    format!(".{parent_name}{suffix}")
                } else {
                    format!(".{parent_name}{suffix}{}", i + 1)
                };
                if let Some(label) = self.labels.get_mut(addr) {
                    label.name = Some(name);
                }
            }
        }
    }
}
