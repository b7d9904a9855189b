use crate::cli::{DecoderArg, FlattenFormat};
use crate::support::{normalize_text, print_json};
use locus_kernel::{flatten_linear, flatten_ordinal, flatten_xml};
use serde_json::{Value, json};

pub fn run(text: String, format: FlattenFormat, decoders: Vec<DecoderArg>, json_output: bool) {
    let (nsrc, flags) = normalize_text(&text, &decoders);
    let (flat, ph_map) = match format {
        FlattenFormat::Linear => {
            let (flat, map) = flatten_linear(&nsrc);
            (flat, json!(map))
        }
        FlattenFormat::Xml => {
            let (flat, map) = flatten_xml(&nsrc);
            (flat, json!(map))
        }
        FlattenFormat::Ordinal => (flatten_ordinal(&nsrc), Value::Null),
    };

    if json_output {
        print_json(&json!({
            "flattened": flat,
            "phMap": ph_map,
            "nsrc": nsrc,
            "flags": flags,
        }));
    } else {
        println!("{flat}");
    }
}
