use rtkrelay::frame::{CarrierSolution, FrameDecoder};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_decode, DecodeOutput, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let capture = std::fs::read(&args.path)
        .map_err(|err| io_error(&format!("read {}", args.path.display()), err))?;

    let chunk_size = usize::from(args.chunk);
    let mut decoder = FrameDecoder::new();
    let mut fixes = Vec::new();
    for chunk in capture.chunks(chunk_size) {
        let mut next = decoder.feed(chunk);
        while let Some(fix) = next {
            fixes.push(fix);
            next = decoder.feed(&[]);
        }
    }

    let fixed = count(&fixes, CarrierSolution::Fixed);
    let float = count(&fixes, CarrierSolution::Float);
    let source = args.path.display().to_string();
    let found = !fixes.is_empty();
    let out = DecodeOutput::new(source.clone(), capture.len() as u64, chunk_size, fixes)
        .with_stats(decoder.stats(), fixed, float);
    print_decode(&out, format);

    if !found {
        return Err(CliError::new(
            DATA_INVALID,
            format!("no position fixes found in {source}"),
        ));
    }
    Ok(SUCCESS)
}

fn count(fixes: &[rtkrelay::frame::PositionFix], solution: CarrierSolution) -> u64 {
    fixes
        .iter()
        .filter(|fix| fix.carrier_solution == solution)
        .count() as u64
}
