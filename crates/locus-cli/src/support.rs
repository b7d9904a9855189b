use crate::cli::DecoderArg;
use locus_kernel::decoders::{
    XmlEntityDecoder, brace_decoder, newline_decoder, printf_decoder, xml_tag_decoder,
};
use locus_kernel::{Decoder, Flags, KernelError, NormalizedString, normalize};
use locus_tm::TranslationMemory;
use serde::Serialize;
use std::process;

/// Tags run before entities so `&lt;b&gt;` stays text.
const DECODER_ORDER: [DecoderArg; 5] = [
    DecoderArg::Xml,
    DecoderArg::Brace,
    DecoderArg::Printf,
    DecoderArg::Newline,
    DecoderArg::Entities,
];

fn decoder_for(arg: DecoderArg) -> Result<Box<dyn Decoder>, KernelError> {
    Ok(match arg {
        DecoderArg::Xml => Box::new(xml_tag_decoder()?),
        DecoderArg::Brace => Box::new(brace_decoder()?),
        DecoderArg::Printf => Box::new(printf_decoder()?),
        DecoderArg::Newline => Box::new(newline_decoder()?),
        DecoderArg::Entities => Box::new(XmlEntityDecoder),
    })
}

/// Selected decoders in canonical order; none selected means all.
pub fn decoder_set(selected: &[DecoderArg]) -> Vec<Box<dyn Decoder>> {
    DECODER_ORDER
        .into_iter()
        .filter(|arg| selected.is_empty() || selected.contains(arg))
        .map(decoder_for)
        .collect::<Result<_, _>>()
        .unwrap_or_else(|e| {
            eprintln!("error: {e}");
            process::exit(1);
        })
}

pub fn normalize_text(text: &str, selected: &[DecoderArg]) -> (NormalizedString, Flags) {
    let decoders = decoder_set(selected);
    let refs: Vec<&dyn Decoder> = decoders.iter().map(|d| d.as_ref()).collect();
    normalize(text, &refs)
}

pub fn print_json(payload: &impl Serialize) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: failed to render json: {e}");
            process::exit(1);
        }
    }
}

pub fn load_tm_or_exit(path: &str) -> TranslationMemory {
    TranslationMemory::load_jsonl(path).unwrap_or_else(|e| {
        eprintln!("error: failed to load TM snapshot {path}: {e}");
        process::exit(1);
    })
}

pub fn runtime_or_exit() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        })
}
