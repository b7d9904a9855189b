use crate::cli::DecoderArg;
use crate::support::{normalize_text, print_json};
use locus_kernel::{flatten_ordinal, guid};
use serde_json::json;

pub fn run(text: String, rid: String, sid: String, decoders: Vec<DecoderArg>, json_output: bool) {
    let (nsrc, _) = normalize_text(&text, &decoders);
    let id = guid(&rid, &sid, &nsrc);

    if json_output {
        print_json(&json!({
            "guid": id,
            "rid": rid,
            "sid": sid,
            "ordinal": flatten_ordinal(&nsrc),
            "nsrc": nsrc,
        }));
    } else {
        println!("{id}");
    }
}
