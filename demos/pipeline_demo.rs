//! Demonstration of the chunking pipeline on a small legal document.
//!
//! Runs the full per-document workflow (normalize, detect invalidations,
//! extract structure, build chunks) without any network services, and prints
//! the resulting chunk records.

use legal_rag_pipeline::{Config, DocumentPipeline, LawCode, RawDocument};

const SAMPLE: &str = "F ə s i l I Ümumi müddəalar\n\n\
    Maddə 1. Mülki qanunvericiliyin vəzifələri\n\
    1.1. mülki hüquq subyektlərinin əmlak münasibətlərini tənzimləmək.\n\
    1.2. fiziki və hüquqi şəxslərin hüquqlarını qorumaq.\n\n\
    Maddə 2. [ləğv edilib]\n\n\
    Maddə 3. Mülki qanunvericiliyin prinsipləri\n\
    Mülki qanunvericilik subyektlərin bərabərliyinə əsaslanır.";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("Legal RAG Pipeline - Chunking Demo");
    println!("==================================");

    let config = Config::default();
    let pipeline = DocumentPipeline::new(&config);

    let document = RawDocument::new(LawCode::Civil, SAMPLE);
    let processed = pipeline.process(&document)?;

    println!(
        "\n{} ({}): {} chunks, {} invalidation span(s)\n",
        document.law_code.name_az(),
        document.law_code,
        processed.chunks.len(),
        processed.invalidation_count
    );

    for chunk in &processed.chunks {
        println!(
            "[{}] {} {} valid={}",
            chunk.chunk_type.as_str(),
            chunk.article.as_deref().unwrap_or("-"),
            chunk.id,
            chunk.is_valid
        );
        if let Some(reason) = chunk.metadata.get("reason") {
            println!("    reason: {}", reason);
        }
        println!("    {}\n", chunk.content);
    }

    let live = processed.valid_chunks().count();
    println!("{} of {} chunks eligible for the live index", live, processed.chunks.len());

    Ok(())
}
