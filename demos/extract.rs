extern crate clap;
extern crate vanc2038;
#[macro_use]
extern crate trackable;

use clap::{App, Arg};
use std::io::Read;
use vanc2038::decoder::Smpte2038Decoder;
use vanc2038::frame::{Frame, VideoFormat};
use vanc2038::pes::{PesExtractor, PesHeader};
use vanc2038::time::Timestamp;
use vanc2038::ts::Pid;

fn main() {
    let matches = App::new("extract")
        .arg(
            Arg::with_name("PID")
                .long("pid")
                .takes_value(true)
                .help("Only examine TS packets with this PID"),
        )
        .arg(
            Arg::with_name("OUTPUT_TYPE")
                .long("output-type")
                .short("o")
                .takes_value(true)
                .possible_values(&["pes", "lines"])
                .default_value("lines"),
        )
        .get_matches();

    let pid = matches.value_of("PID").map(|s| {
        let pid = s.parse::<u16>().expect("PID must be a number");
        track_try_unwrap!(Pid::new(pid))
    });

    let mut stdin = std::io::stdin();
    let mut packet = [0u8; 188];
    match matches.value_of("OUTPUT_TYPE").unwrap() {
        "pes" => {
            let mut extractor = PesExtractor::new(pid);
            while stdin.read_exact(&mut packet).is_ok() {
                track_try_unwrap!(extractor.push(&packet));
                while let Some(pes) = extractor.pop_payload() {
                    if let Ok(header) = PesHeader::read_from(&pes[..]) {
                        let kind = if header.stream_id.is_audio() {
                            "audio"
                        } else if header.stream_id.is_video() {
                            "video"
                        } else if header.stream_id.is_private_stream_1() {
                            "private-1"
                        } else {
                            "other"
                        };
                        println!(
                            "{} stream_id={:#04x} pts={:?} {} bytes",
                            kind,
                            header.stream_id.as_u8(),
                            header.pts.map(|p| p.as_u64()),
                            pes.len()
                        );
                    }
                }
            }
        }
        "lines" => {
            let fmt = VideoFormat {
                width: 1920,
                height: 1080,
                sar_num: 1,
                sar_den: 1,
            };
            let mut decoder = Smpte2038Decoder::new(pid);
            let mut last: Option<Frame> = None;
            let clock = track_try_unwrap!(Timestamp::new(0));
            while stdin.read_exact(&mut packet).is_ok() {
                let frames = track_try_unwrap!(decoder.decode(&packet, clock));
                for frame in frames {
                    if let Some(prev) = last.take() {
                        print_frame(&prev, &fmt);
                    }
                    last = Some(frame);
                }
            }
            if let Some(prev) = last.take() {
                print_frame(&prev, &fmt);
            }
        }
        _ => unreachable!(),
    }
}

fn print_frame(frame: &Frame, fmt: &VideoFormat) {
    let display_ts = track_try_unwrap!(Timestamp::new(frame.target_pts()));
    frame.update(fmt, fmt, display_ts);
    for region in frame.regions() {
        print!("pts={} line={:3}:", frame.target_pts(), region.line_number);
        for word in region.words {
            print!(" {:03x}", word);
        }
        println!();
    }
}
