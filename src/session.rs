use std::rc::Rc;

use crate::effect::EffectChain;
use crate::error::Result;
use crate::graph::Graph;
use crate::patch::Patch;
use crate::sequencer::{Sequencer, Subdivision};
use crate::voice::Voice;

/// A patch instantiated on a graph: voices feed the chain, the sequencer
/// triggers the voices.
pub struct Session {
    pub chain: EffectChain,
    pub sequencer: Sequencer<Graph>,
    voices: Vec<Rc<Voice>>,
}

impl Session {
    pub fn build(graph: &Graph, patch: &Patch) -> Result<Self> {
        let chain = EffectChain::build(graph, &patch.chain, graph.destination())?;
        let mut sequencer = Sequencer::new(graph.clone(), patch.sequencer.clone())?;

        let mut voices = Vec::with_capacity(patch.voices.len());
        for spec in &patch.voices {
            voices.push((spec.subdivision, Rc::new(Voice::new(graph, spec, chain.input())?)));
        }
        for sub in Subdivision::ALL {
            let bound: Vec<Rc<Voice>> = voices
                .iter()
                .filter(|(s, _)| *s == sub)
                .map(|(_, v)| v.clone())
                .collect();
            if bound.is_empty() {
                continue;
            }
            sequencer.on(sub, move |time| {
                for voice in &bound {
                    voice.trigger(time);
                }
            });
        }
        log::info!(
            "session: {} voices into {} effects at {} bpm",
            voices.len(),
            chain.len(),
            sequencer.tempo()
        );

        Ok(Self {
            chain,
            sequencer,
            voices: voices.into_iter().map(|(_, v)| v).collect(),
        })
    }

    pub fn voices(&self) -> &[Rc<Voice>] {
        &self.voices
    }
}
