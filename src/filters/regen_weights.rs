/*
    fixed parameters of the detail regeneration network. nothing here is
    trained: every tensor is a hand written local operator, built by const fns
    and baked into the binary.

    layer 1 (3 -> 16): per colour channel five shifted copies (center, up,
        down, left, right) in features c*5 .. c*5+4, feature 15 is luma.
    layer 2 (16 -> 16): identity, a relu stage between 1 and 3.
    layer 3 (16 -> 12): per colour channel and 2x2 sub-position, the center
        feature boosted, the two neighbours facing that sub-position pulled
        down harder than the other two, plus a little luma.

    weight layout: weights[((oc * 3 + ky) * 3 + kx) * in_channels + ic]
*/

pub const INPUT_CHANNELS: usize = 3;
pub const UPSCALE: usize = 2;
pub const KERNEL: usize = 3;
pub const CONV1_OUT: usize = 16;
pub const CONV2_OUT: usize = 16;
pub const CONV3_OUT: usize = INPUT_CHANNELS * UPSCALE * UPSCALE;

const FEATURES_PER_CHANNEL: usize = 5;
const LUMA_FEATURE: usize = 15;

// offsets inside a channel's feature group
const CENTER: usize = 0;
const UP: usize = 1;
const DOWN: usize = 2;
const LEFT: usize = 3;
const RIGHT: usize = 4;

const MAIN_GAIN: f32 = 1.2;
const STRONG_PULL: f32 = -0.1;
const WEAK_PULL: f32 = -0.05;
const LUMA_BLEND: f32 = 0.05;
const ONE_THIRD: f32 = 0.333_333_34;

// sub-positions in pixel shuffle order: top-left, top-right, bottom-left, bottom-right
const STRONG_PAIRS: [[usize; 2]; 4] = [[UP, LEFT], [UP, RIGHT], [DOWN, LEFT], [DOWN, RIGHT]];
const WEAK_PAIRS: [[usize; 2]; 4] = [[DOWN, RIGHT], [DOWN, LEFT], [UP, RIGHT], [UP, LEFT]];

pub const fn weight_count(out_channels: usize, in_channels: usize) -> usize {
    out_channels * KERNEL * KERNEL * in_channels
}

pub const fn conv_index(
    out_channel: usize,
    ky: usize,
    kx: usize,
    in_channel: usize,
    in_channels: usize,
) -> usize {
    ((out_channel * KERNEL + ky) * KERNEL + kx) * in_channels + in_channel
}

const CONV1_LEN: usize = weight_count(CONV1_OUT, INPUT_CHANNELS);
const CONV2_LEN: usize = weight_count(CONV2_OUT, CONV1_OUT);
const CONV3_LEN: usize = weight_count(CONV3_OUT, CONV2_OUT);

const fn make_conv1() -> [f32; CONV1_LEN] {
    let mut data = [0.0f32; CONV1_LEN];
    let n = INPUT_CHANNELS;
    let mut channel = 0;
    while channel < INPUT_CHANNELS {
        let base = channel * FEATURES_PER_CHANNEL;
        data[conv_index(base + CENTER, 1, 1, channel, n)] = 1.0;
        data[conv_index(base + UP, 0, 1, channel, n)] = 1.0;
        data[conv_index(base + DOWN, 2, 1, channel, n)] = 1.0;
        data[conv_index(base + LEFT, 1, 0, channel, n)] = 1.0;
        data[conv_index(base + RIGHT, 1, 2, channel, n)] = 1.0;

        data[conv_index(LUMA_FEATURE, 1, 1, channel, n)] = ONE_THIRD;
        channel += 1;
    }
    data
}

const fn make_conv2() -> [f32; CONV2_LEN] {
    let mut data = [0.0f32; CONV2_LEN];
    let mut channel = 0;
    while channel < CONV2_OUT {
        data[conv_index(channel, 1, 1, channel, CONV1_OUT)] = 1.0;
        channel += 1;
    }
    data
}

const fn make_conv3() -> [f32; CONV3_LEN] {
    let mut data = [0.0f32; CONV3_LEN];
    let n = CONV2_OUT;
    let mut channel = 0;
    while channel < INPUT_CHANNELS {
        let base = channel * FEATURES_PER_CHANNEL;
        let mut sub = 0;
        while sub < UPSCALE * UPSCALE {
            let oc = channel * UPSCALE * UPSCALE + sub;
            data[conv_index(oc, 1, 1, base + CENTER, n)] = MAIN_GAIN;

            let mut k = 0;
            while k < 2 {
                data[conv_index(oc, 1, 1, base + STRONG_PAIRS[sub][k], n)] = STRONG_PULL;
                k += 1;
            }
            k = 0;
            while k < 2 {
                data[conv_index(oc, 1, 1, base + WEAK_PAIRS[sub][k], n)] = WEAK_PULL;
                k += 1;
            }

            data[conv_index(oc, 1, 1, LUMA_FEATURE, n)] = LUMA_BLEND;
            sub += 1;
        }
        channel += 1;
    }
    data
}

pub static CONV1_WEIGHTS: [f32; CONV1_LEN] = make_conv1();
pub static CONV1_BIAS: [f32; CONV1_OUT] = [0.0; CONV1_OUT];
pub static CONV2_WEIGHTS: [f32; CONV2_LEN] = make_conv2();
pub static CONV2_BIAS: [f32; CONV2_OUT] = [0.0; CONV2_OUT];
pub static CONV3_WEIGHTS: [f32; CONV3_LEN] = make_conv3();
pub static CONV3_BIAS: [f32; CONV3_OUT] = [0.0; CONV3_OUT];

/// One 3x3 convolution of the network.
#[derive(Debug, Clone, Copy)]
pub struct ConvLayer {
    pub in_channels: usize,
    pub out_channels: usize,
    pub weights: &'static [f32],
    pub bias: &'static [f32],
    pub relu: bool,
}

pub static LAYERS: [ConvLayer; 3] = [
    ConvLayer {
        in_channels: INPUT_CHANNELS,
        out_channels: CONV1_OUT,
        weights: &CONV1_WEIGHTS,
        bias: &CONV1_BIAS,
        relu: true,
    },
    ConvLayer {
        in_channels: CONV1_OUT,
        out_channels: CONV2_OUT,
        weights: &CONV2_WEIGHTS,
        bias: &CONV2_BIAS,
        relu: true,
    },
    ConvLayer {
        in_channels: CONV2_OUT,
        out_channels: CONV3_OUT,
        weights: &CONV3_WEIGHTS,
        bias: &CONV3_BIAS,
        relu: false,
    },
];
