// A small end-to-end demo on synthetic poses: record two gestures, train,
// then stream a held pose until the stability filter emits it.
use handsign::{Landmark, LANDMARK_COUNT, RecognizerContext};

fn synthetic_pose(base: f32, variant: usize) -> Vec<Landmark> {
    let jitter = variant as f32 * 0.002;
    (0..LANDMARK_COUNT)
        .map(|i| {
            Landmark::new(
                0.5 + base * 0.02 * i as f32 + jitter,
                0.5 - base * 0.015 * i as f32 - jitter,
                0.001 * i as f32,
            )
        })
        .collect()
}

fn main() {
    env_logger::init();

    let mut ctx = RecognizerContext::new();
    for v in 0..20 {
        ctx.record_sample("open", &synthetic_pose(1.0, v)).unwrap();
        ctx.record_sample("fist", &synthetic_pose(-1.0, v)).unwrap();
    }
    println!("dataset: {:?}", ctx.dataset().stats());

    let mut progress = |epoch: u32, total: u32, train_acc: f32, val_acc: f32| {
        if epoch % 10 == 0 || epoch == total {
            println!("epoch {epoch}/{total}: acc={train_acc:.3}, val_acc={val_acc:.3}");
        }
    };
    ctx.train(Some(&mut progress)).expect("training failed");

    // Stream a held "open" pose at ~30 Hz until it emits.
    for frame in 0..30u64 {
        let (verdict, emitted) = ctx.on_pose(&synthetic_pose(1.0, 4), frame * 33);
        if let Some(name) = emitted {
            println!(
                "emitted {:?} at {} ms (last verdict: {} @ {:.2})",
                name,
                frame * 33,
                verdict.label(),
                verdict.confidence()
            );
            break;
        }
    }
}
